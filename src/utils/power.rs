// src/utils/power.rs

use crate::{errors::AdapterError, utils::command};

/// Reads the GUID of the machine's active power scheme from
/// `powercfg /getactivescheme`.
pub fn active_scheme() -> Result<String, AdapterError> {
    let output = command::run("powercfg", &["/getactivescheme"])?;
    parse_scheme_guid(&output).ok_or_else(|| {
        AdapterError::Other(format!(
            "unexpected powercfg output: '{}'",
            output.trim()
        ))
    })
}

/// Activates the power scheme with the given GUID.
pub fn set_active_scheme(guid: &str) -> Result<(), AdapterError> {
    command::run("powercfg", &["/setactive", guid]).map(|_| ())
}

// Output looks like:
//   Power Scheme GUID: 381b4222-f694-41f0-9685-ff5bb260df2e  (Balanced)
fn parse_scheme_guid(output: &str) -> Option<String> {
    output
        .split_whitespace()
        .find(|token| token.len() == 36 && token.chars().filter(|c| *c == '-').count() == 4)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_guid_out_of_powercfg_output() {
        let output = "Power Scheme GUID: 381b4222-f694-41f0-9685-ff5bb260df2e  (Balanced)\n";
        assert_eq!(
            parse_scheme_guid(output).as_deref(),
            Some("381b4222-f694-41f0-9685-ff5bb260df2e")
        );
    }

    #[test]
    fn localized_label_does_not_matter() {
        let output = "Schema de energia GUID: 8c5e7fda-e8bf-4a96-9a85-a6e23a8c635c  (Alto)\n";
        assert_eq!(
            parse_scheme_guid(output).as_deref(),
            Some("8c5e7fda-e8bf-4a96-9a85-a6e23a8c635c")
        );
    }

    #[test]
    fn garbage_output_yields_none() {
        assert_eq!(parse_scheme_guid("no guid here"), None);
    }
}
