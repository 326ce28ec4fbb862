//! End-to-end tests of the scoring pipeline.

use akuru::decode::{decode_data_url, encode_data_url};
use akuru::{
    extract_features, Analyzer, AnalyzerConfig, BoundingBox, EnsembleKind, ExtractionParams,
    Feature, GrayImage, Label, MethodResult, MethodWeights, WeightedEnsemble, ALPHABET,
};

fn l(s: &str) -> Label {
    s.parse().unwrap()
}

fn blank() -> GrayImage {
    GrayImage::from_fn(280, 280, |_, _| 255)
}

/// A few distinct letter-like drawings on a 280x280 canvas.
fn drawings() -> Vec<GrayImage> {
    let ring = GrayImage::from_fn(280, 280, |x, y| {
        let d = ((x as f64 - 140.0).powi(2) + (y as f64 - 140.0).powi(2)).sqrt();
        if (50.0..=60.0).contains(&d) {
            0
        } else {
            255
        }
    });
    let bar = GrayImage::from_fn(280, 280, |x, y| {
        if (40..240).contains(&x) && (130..145).contains(&y) {
            10
        } else {
            255
        }
    });
    let hook = GrayImage::from_fn(280, 280, |x, y| {
        let stem = (100..112).contains(&x) && (60..220).contains(&y);
        let foot = (100..200).contains(&x) && (208..220).contains(&y);
        let d = ((x as f64 - 150.0).powi(2) + (y as f64 - 100.0).powi(2)).sqrt();
        let loop_ = (30.0..=38.0).contains(&d);
        if stem || foot || loop_ {
            0
        } else {
            255
        }
    });
    vec![ring, bar, hook, blank()]
}

#[test]
fn blank_canvas_features() {
    let features = extract_features(&blank(), &Feature::ALL, &ExtractionParams::default());
    assert_eq!(features.scalar(Feature::Density), Some(0.0));
    assert_eq!(features.scalar(Feature::Complexity), Some(0.0));
    assert_eq!(features.bounding_box(), Some(BoundingBox::new(0, 0, 0, 0)));
}

#[test]
fn confidences_stay_in_unit_interval() {
    let analyzer = Analyzer::default();
    for image in drawings() {
        for target in ["ක", "ට", "ප", "ම", "ෆ"] {
            let analysis = analyzer.analyze_str(&image, target).unwrap();
            let result = &analysis.result;
            assert!((0.0..=1.0).contains(&result.confidence));
            for r in &result.method_results {
                assert!((0.0..=1.0).contains(&r.confidence), "{}", r.method);
            }
            for s in &result.ranked {
                assert!((0.0..=1.0).contains(&s.confidence));
                // No other letter beats the reported prediction
                assert!(s.confidence <= result.confidence + 1e-12);
            }
            assert_eq!(result.is_correct, result.prediction == l(target));
            if let Some(first) = result.ranked.first() {
                assert_eq!(first.letter, result.prediction);
            }
        }
    }
}

#[test]
fn same_drawing_same_verdict() {
    let analyzer = Analyzer::default();
    for image in drawings() {
        let a = analyzer.analyze_str(&image, "ප").unwrap();
        let b = analyzer.analyze_str(&image, "ප").unwrap();
        assert_eq!(a.result, b.result);
        assert_eq!(a.feedback, b.feedback);
    }
}

#[test]
fn tie_resolves_to_target() {
    let ensemble = WeightedEnsemble::new(MethodWeights::new().with("A", 0.5).with("B", 0.5));
    let verdict = ensemble.combine(
        vec![
            MethodResult::new("A", l("ක"), 0.9),
            MethodResult::new("B", l("ප"), 0.9),
        ],
        l("ක"),
    );
    assert_eq!(verdict.prediction, l("ක"));
    assert!(verdict.is_correct);
}

#[test]
fn empty_results_fall_back() {
    let verdict = WeightedEnsemble::default().combine(Vec::new(), l("ම"));
    assert_eq!(verdict.prediction, l("ම"));
    assert_eq!(verdict.ensemble_type, EnsembleKind::Fallback);
    assert!((verdict.confidence - 0.65).abs() < 1e-9);

    // An analyzer with no methods behaves the same way
    let config = AnalyzerConfig::from_toml_str("[analysis]\nmethods = []\n").unwrap();
    let analyzer = Analyzer::from_config(&config).unwrap();
    let analysis = analyzer.analyze_str(&blank(), "ම").unwrap();
    assert_eq!(analysis.result.ensemble_type, EnsembleKind::Fallback);
    assert!(analysis.feedback.contains("65%"));
}

#[test]
fn data_url_matches_direct_analysis() {
    let analyzer = Analyzer::default();
    for image in drawings() {
        let url = encode_data_url(&image).unwrap();
        let decoded = decode_data_url(&url).unwrap();
        assert_eq!(decoded, image);

        let direct = analyzer.analyze_str(&image, "ක").unwrap();
        let via_url = analyzer.analyze_str(&decoded, "ක").unwrap();
        assert_eq!(direct.result, via_url.result);
    }
}

#[test]
fn mock_method_is_reproducible_per_seed() {
    let config = AnalyzerConfig::from_toml_str(
        r#"
        [analysis]
        methods = ["mock"]

        [mock]
        seed = 1234
        "#,
    )
    .unwrap();
    let first = Analyzer::from_config(&config).unwrap();
    let second = Analyzer::from_config(&config).unwrap();

    for image in drawings() {
        let a = first.analyze_str(&image, "ට").unwrap();
        let b = second.analyze_str(&image, "ට").unwrap();
        assert_eq!(a.result, b.result);
        assert_eq!(a.result.method_names(), vec!["mock"]);
    }
}

#[test]
fn configured_profile_drives_prediction() {
    // Profile ම by the ink density of the bar drawing (3000 / 78400)
    let config = AnalyzerConfig::from_toml_str(
        r#"
        [analysis]
        methods = ["vision_like"]

        [profiles."ම"]
        density = 0.0388
        "#,
    )
    .unwrap();
    let analyzer = Analyzer::from_config(&config).unwrap();
    let images = drawings();

    let analysis = analyzer.analyze_str(&images[1], "ම").unwrap();
    assert_eq!(analysis.result.prediction, l("ම"));
    assert!(analysis.result.confidence > 0.99);
    assert!(analysis.feedback.starts_with("Excellent!"));
}

#[test]
fn every_letter_is_a_valid_target() {
    let analyzer = Analyzer::default();
    let images = drawings();
    for letter in ALPHABET {
        let analysis = analyzer.analyze_str(&images[0], letter).unwrap();
        assert_eq!(analysis.target.as_str(), letter);
    }
}

#[test]
fn sample_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/akuru.toml");
    let config = AnalyzerConfig::from_file(path).unwrap();
    assert_eq!(config.server.port, 5000);
    let analyzer = Analyzer::from_config(&config).unwrap();
    assert_eq!(analyzer.method_names().len(), 3);
    assert!(analyzer.tables().profiles.get(l("ම")).is_some());
}
