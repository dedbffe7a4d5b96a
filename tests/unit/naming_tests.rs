/*!
 * Tests for output naming
 */

use chapsplit::app_config::NamingConfig;
use chapsplit::naming::{generate_safe_filename, output_dir_name, NameSanitizer, StemNamer};

#[test]
fn test_safeName_withDefaultTemplate_shouldPrefixPaddedIndex() {
    let namer = NameSanitizer::default();
    assert_eq!(namer.safe_name("Opening", 3), "03 - Opening");
    assert_eq!(namer.safe_name("Opening", 123), "123 - Opening");
}

#[test]
fn test_safeName_withWindowsUnsafeCharacters_shouldNeverKeepThem() {
    let namer = NameSanitizer::default();
    let stem = namer.safe_name("Q&A: what/why? <live> | \"raw\" *", 1);
    for forbidden in ['<', '>', ':', '"', '/', '\\', '|', '?', '*'] {
        assert!(!stem.contains(forbidden), "{:?} still contains {:?}", stem, forbidden);
    }
    assert!(stem.starts_with("01 - Q&A"));
}

#[test]
fn test_safeName_withOnlyUnusableCharacters_shouldFallBackToIndex() {
    let namer = NameSanitizer::default();
    assert_eq!(namer.safe_name("  \t \u{0007} ", 7), "07");
    assert_eq!(namer.safe_name("...", 12), "12");
}

#[test]
fn test_safeName_withTitleOnlyTemplate_shouldKeepTitle() {
    let config = NamingConfig {
        template: "{title}".to_string(),
        ..NamingConfig::default()
    };
    let namer = NameSanitizer::new(&config);
    assert_eq!(namer.safe_name("Closing words", 9), "Closing words");
}

#[test]
fn test_safeName_withShortMaxLength_shouldTruncateOnCharBoundary() {
    let config = NamingConfig {
        template: "{title}".to_string(),
        sanitize_maxlen: 5,
        ..NamingConfig::default()
    };
    let namer = NameSanitizer::new(&config);
    assert_eq!(namer.safe_name("ééééééééé", 1), "ééééé");
}

#[test]
fn test_generateSafeFilename_withReservedDeviceNames_shouldSuffix() {
    let replace = NamingConfig::default().replace_chars;
    assert_eq!(generate_safe_filename("NUL", 120, &replace), "NUL_file");
    assert_eq!(generate_safe_filename("com1", 120, &replace), "com1_file");
    assert_eq!(generate_safe_filename("console", 120, &replace), "console");
}

#[test]
fn test_outputDirName_withLongTitle_shouldCapTitlePart() {
    let replace = NamingConfig::default().replace_chars;
    let name = output_dir_name(&"x".repeat(80), "vid", &replace);
    assert_eq!(name, format!("{}-vid", "x".repeat(50)));
}
