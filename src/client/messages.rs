//! User-facing text for error codes.

/// Message shown for an error `code`; unknown codes show `raw` unchanged.
pub fn user_message(code: &str, raw: &str) -> String {
    let message = match code {
        "ValidationError" => "Some fields are missing or malformed.",
        "InvalidKey" => {
            "Keys are dot-separated segments of lowercase letters, digits, '_' or '-', \
             each starting with a letter and ending with a letter or digit."
        }
        "InvalidLanguageCode" => {
            "Language codes start with a lowercase letter and contain only letters, digits, '_' or '-'."
        }
        "DuplicateKey" => "A key with this name already exists.",
        "NestedUnderLeaf" => "This key would sit under an existing key, which cannot have children.",
        "ParentOfExisting" => "Other keys already live under this name, so it cannot be a key itself.",
        "UnchangedName" => "The new name is the same as the current one.",
        "DuplicateLanguage" => "A language with this code already exists.",
        "UnknownParent" => "The selected parent language does not exist.",
        "ParentCycle" => "A language cannot be placed under itself or one of its own sub-languages.",
        "UnknownKey" => "This key no longer exists.",
        "UnknownLanguage" => "This language no longer exists.",
        "NotFound" => "It may have been deleted in another session.",
        "StorageError" => "The change could not be saved. Nothing was modified.",
        "TransportError" => "The server could not be reached. The change may or may not have been applied; refresh before retrying.",
        _ => return raw.to_string(),
    };
    message.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_are_translated() {
        assert_eq!(
            user_message("DuplicateKey", "key 'a' already exists"),
            "A key with this name already exists."
        );
        assert!(user_message("TransportError", "connection refused").contains("refresh"));
    }

    #[test]
    fn test_unknown_code_shows_raw_error() {
        assert_eq!(user_message("Teapot", "I'm a teapot"), "I'm a teapot");
    }
}
