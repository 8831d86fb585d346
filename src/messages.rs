//! User-facing texts. `%{key}` placeholders are filled by [`fill`].

pub const UNAUTHORIZED: &str = "❌ Unauthorized access!";
pub const DB_ERROR: &str = "⚠ An error occurred while accessing the database. Please try again.";
pub const INPUT_TOKEN_ADDRESS: &str = "🖊 Please input the token address";
pub const VALID_ADDRESS: &str = "❗ Please provide the valid address.";
pub const NO_TOKEN_INFO: &str = "ℹ There is no token information.";
pub const NO_MATCHES: &str = "ℹ No sniping activity matched.";

pub const SNIPER_ADDED: &str =
    "🎉 Sniper Bot added successfully:\n\n🆔 ID: %{id}\n📌 Address: %{address}\n👤 Bot Name: %{name}";
pub const NO_SNIPER_BOTS: &str = "⚠ There are no Sniping Bots available.";
pub const SNIPER_EXISTS: &str = "This bot's name or address already existed.";
pub const SNIPER_NOT_EXIST: &str = "⚠ This bot is not exist";
pub const SNIPER_DELETED: &str = "👌 This bot has been successfully deleted.";
pub const SNIPER_COUNT: &str = "📃There are %{count} sniping bots.\n\n";
pub const SNIPER_INFO: &str = "🆔 ID: %{id}\n📌 Address:%{address}\n👤 Bot Name: %{name}\n\n";

pub const DETERMINE_RANGE_TYPE: &str =
    "🔍 Please select a range type:\n\nR - Range 📊\nF - Fixed Value 🔢";
pub const INVALID_RANGE_TYPE: &str =
    "❌ Invalid input. Please type 'R' for Range or 'F' for Fixed Value.";
pub const INPUT_MIN: &str = "✏️ Please enter the minimum value:";
pub const INPUT_MAX: &str = "✏️ Please enter the maximum value:";
pub const INPUT_FIXED: &str = "✏️ Please enter the fixed value:";
pub const INVALID_MIN: &str = "❌ Invalid minimum value. Please enter a valid number.";
pub const INVALID_MAX: &str = "❌ Invalid maximum value. It must be greater than the minimum.";
pub const INVALID_FIXED: &str = "❌ Invalid fixed value. Please enter a valid number.";
pub const INPUT_SNIPER_NAME: &str = "✏️ Please enter the sniper bot name:";
pub const INPUT_SNIPER_ADDRESS: &str = "✏️ Please enter the sniper bot address:";
pub const INVALID_ADDRESS: &str = "❌ Invalid contract address.";
pub const INPUT_SNIPER_ID: &str = "✏️ Please enter the sniper bot ID:";
pub const INVALID_SNIPER_ID: &str = "❌ Invalid sniper ID.";

pub const KEYWORD_USAGE: &str = "⚠ Invalid format. The correct format is:\n\n/add_keyword <keyword>";
pub const KEYWORD_EXISTS: &str = "🔔 This keyword already exists.";
pub const KEYWORD_ADDED: &str = "👌 New keyword has been successfully added.";
pub const KEYWORD_NOT_EXIST: &str = "⚠ This keyword is not exists.";
pub const KEYWORD_DELETED: &str = "👌 \"%{keyword}\" keyword has been successfully deleted.";
pub const NO_KEYWORDS: &str = "⚠ There are no keywords available.";

pub const GROUP_USAGE: &str =
    "⚠ Invalid format. The correct format is:\n\n/add_group <group_id> <group_username> [group title]";
pub const GROUP_EXISTS: &str = "🔔 This group is already added to the database.";
pub const GROUP_ADDED: &str =
    "🎉 Group added successfully:\n\n📌 Group Title: %{groupTitle}\n🆔 Group ID: %{groupId}\n👤 Group Username: %{groupName}";
pub const GROUP_NOT_EXIST: &str = "🔔 This group is not exists.";
pub const GROUP_REMOVED: &str = "🎉 Group removed successfully";
pub const NO_GROUPS: &str = "🔔 There are no groups available.";
pub const GROUP_COUNT: &str = "📃 There are %{count} groups:\n\n";
pub const GROUP_INFO: &str =
    "📌 Group Title: %{groupTitle}\n🆔 Group ID: %{groupId}\n👤 Group Username: %{groupName}\n\n";

/// Replace each `%{key}` in `template`; unknown keys are left as written
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("%{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match values.iter().find(|(k, _)| *k == key) {
                    Some((_, value)) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_known_placeholders() {
        let text = fill(SNIPER_ADDED, &[("id", "3"), ("address", "0xab"), ("name", "banana")]);
        assert!(text.ends_with("🆔 ID: 3\n📌 Address: 0xab\n👤 Bot Name: banana"));
    }

    #[test]
    fn unknown_and_unclosed_placeholders_stay() {
        assert_eq!(fill("a %{x} b %{y", &[("z", "1")]), "a %{x} b %{y");
        assert_eq!(fill("%{count}%{count}", &[("count", "2")]), "22");
    }
}
