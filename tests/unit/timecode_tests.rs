/*!
 * Tests for timecode parsing and formatting
 */

use chapsplit::errors::TimecodeError;
use chapsplit::timecode::{format_timecode, parse_timecode, parse_timecode_ms};

#[test]
fn test_parseTimecode_withAllAcceptedForms_shouldAgree() {
    assert_eq!(parse_timecode("00:01:30").unwrap(), 90.0);
    assert_eq!(parse_timecode("01:30").unwrap(), 90.0);
    assert_eq!(parse_timecode("90").unwrap(), 90.0);
}

#[test]
fn test_parseTimecodeMs_withFraction_shouldPadToMillis() {
    assert_eq!(parse_timecode_ms("1.5").unwrap(), 1500);
    assert_eq!(parse_timecode_ms("00:00:01.05").unwrap(), 1050);
    assert_eq!(parse_timecode_ms("00:00:01.005").unwrap(), 1005);
}

#[test]
fn test_parseTimecode_withMinutesAboveSixtyInShortForm_shouldBeAccepted() {
    assert_eq!(parse_timecode("75:00").unwrap(), 4500.0);
}

#[test]
fn test_parseTimecode_withInvalidInputs_shouldReturnTypedError() {
    for input in ["", "   ", "-5", "1:2:3:4", "aa:10", "10:61", "1:60:00", "1.2345", "1,5"] {
        let err = parse_timecode(input).unwrap_err();
        assert!(
            matches!(err, TimecodeError::InvalidTimecode { .. }),
            "expected an error for {:?}",
            input
        );
    }
}

#[test]
fn test_formatTimecode_withParsedValue_shouldRoundTrip() {
    let seconds = parse_timecode("02:03:04.567").unwrap();
    assert_eq!(format_timecode(seconds), "02:03:04.567");
}
