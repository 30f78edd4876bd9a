use log::debug;

/// Outputs match when they are equal once leading and trailing whitespace is stripped.
/// Everything in between, line breaks included, must be identical.
pub fn outputs_match(obtained: &str, expected: &str) -> bool {
    if obtained.trim() == expected.trim() {
        return true;
    }
    debug!("  ❌ Failed output comparison.");
    debug!("   -📋 Expected: '{}'", expected.replace('\n', "\\n"));
    debug!("   -📊 Obtained: '{}'", obtained.replace('\n', "\\n"));
    false
}
