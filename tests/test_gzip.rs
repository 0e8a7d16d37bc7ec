use std::io::Read;

use flate2::read::GzDecoder;
use granite::config::{Config, GzipConfig};
use granite::gzip::GzipPolicy;

fn policy_with(enabled: bool, level: u32, threshold: u64, exclude: &str) -> GzipPolicy {
    let mut config = Config::default();
    config.gzip = GzipConfig {
        enabled,
        level,
        threshold,
        exclude: exclude.to_string(),
    };
    GzipPolicy::from_config(&config).unwrap()
}

#[test]
fn test_eligibility_requires_every_condition() {
    let policy = policy_with(true, 0, 1500, "");

    // All conditions met.
    assert!(policy.eligible(true, 5000, "page.txt"));

    // Each condition alone turns it off.
    assert!(!policy.eligible(false, 5000, "page.txt"));
    assert!(!policy.eligible(true, 1200, "page.txt"));
    assert!(!policy.eligible(true, 5000, "photo.jpg"));

    let disabled = policy_with(false, 0, 1500, "");
    assert!(!disabled.eligible(true, 5000, "page.txt"));
}

#[test]
fn test_eligibility_threshold_boundary() {
    let policy = policy_with(true, 0, 1500, "");

    assert!(!policy.eligible(true, 1499, "a.txt"));
    assert!(!policy.eligible(true, 1500, "a.txt"));
    assert!(policy.eligible(true, 1501, "a.txt"));
}

#[test]
fn test_default_exclude_pattern_matches_images_and_pdf() {
    let policy = policy_with(true, 0, 0, "");

    for name in ["a.jpeg", "b.jpg", "c.png", "d.pdf"] {
        assert!(!policy.eligible(true, 5000, name), "{} should be excluded", name);
    }
    for name in ["a.txt", "b.html", "c.css", "pngnot"] {
        assert!(policy.eligible(true, 5000, name), "{} should be eligible", name);
    }
}

#[test]
fn test_custom_exclude_pattern() {
    let policy = policy_with(true, 0, 0, r"\.min\.js$");

    assert!(!policy.eligible(true, 5000, "app.min.js"));
    assert!(policy.eligible(true, 5000, "app.js"));
}

#[test]
fn test_invalid_exclude_pattern_is_an_error() {
    let mut config = Config::default();
    config.gzip = GzipConfig {
        enabled: true,
        level: 0,
        threshold: 1500,
        exclude: "(unclosed".to_string(),
    };

    assert!(GzipPolicy::from_config(&config).is_err());
}

#[test]
fn test_compression_round_trip() {
    let policy = policy_with(true, 0, 0, "");
    let original: Vec<u8> = b"granite ".iter().copied().cycle().take(5000).collect();

    let compressed = policy.compress(&original).unwrap();
    assert!(compressed.len() < original.len());

    let mut decompressed = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut decompressed)
        .unwrap();
    assert_eq!(decompressed, original);
}

#[test]
fn test_explicit_level_round_trip() {
    let policy = policy_with(true, 9, 0, "");
    let original: Vec<u8> = (0..=255u8).cycle().take(4096).collect();

    let compressed = policy.compress(&original).unwrap();

    let mut decompressed = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut decompressed)
        .unwrap();
    assert_eq!(decompressed, original);
}

#[test]
fn test_empty_input_round_trip() {
    let policy = policy_with(true, 0, 0, "");

    let compressed = policy.compress(b"").unwrap();

    let mut decompressed = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut decompressed)
        .unwrap();
    assert!(decompressed.is_empty());
}
