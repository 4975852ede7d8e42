//! End-to-end recognition tests on synthetic photos.
//!
//! Uses the built-in projection model, so results are deterministic and no
//! model files are needed. The "cats" are simple high-contrast patterns whose
//! pooled pixel statistics are either nearly identical (re-encodings),
//! nearly orthogonal (different layouts), or nearly opposite (inversions).

use image::{DynamicImage, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use whisker_core::{
    aggregate_references, hamming_distance, ExtractorConfig, FeatureExtractor, ModelSource,
    RecognitionSettings, Recognizer, ReferenceRecord, WhiskerError,
};

const WIDTH: u32 = 128;
const HEIGHT: u32 = 96;

/// Left half bright, right half dark.
fn vertical_split() -> RgbImage {
    RgbImage::from_fn(WIDTH, HEIGHT, |x, _| {
        if x < WIDTH / 2 {
            Rgb([250, 240, 235])
        } else {
            Rgb([10, 15, 20])
        }
    })
}

/// Top half bright, bottom half dark.
fn horizontal_split() -> RgbImage {
    RgbImage::from_fn(WIDTH, HEIGHT, |_, y| {
        if y < HEIGHT / 2 {
            Rgb([250, 240, 235])
        } else {
            Rgb([10, 15, 20])
        }
    })
}

fn invert(image: &RgbImage) -> RgbImage {
    let mut inverted = image.clone();
    image::imageops::invert(&mut inverted);
    inverted
}

fn png(image: &RgbImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut buffer, image::ImageFormat::Png)
        .expect("PNG encoding failed");
    buffer.into_inner()
}

fn jpeg(image: &RgbImage, quality: u8) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    DynamicImage::ImageRgb8(image.clone())
        .write_with_encoder(encoder)
        .expect("JPEG encoding failed");
    buffer.into_inner()
}

fn recognizer() -> Recognizer {
    Recognizer::new(FeatureExtractor::default(), RecognitionSettings::default())
}

fn enroll(recognizer: &Recognizer, cat_id: i64, photos: Vec<(i64, Vec<u8>)>) -> Vec<ReferenceRecord> {
    recognizer
        .enroll(photos)
        .into_iter()
        .map(|outcome| {
            let signature = outcome.result.expect("enrollment failed");
            ReferenceRecord::new(Some(cat_id), outcome.reference_id, &signature)
        })
        .collect()
}

// ============================================================================
// Signature properties
// ============================================================================

#[test]
fn test_jpeg_reencoding_stays_similar() {
    let recognizer = recognizer();
    let original = recognizer.compute_signature(&png(&vertical_split())).unwrap();
    let compressed = recognizer.compute_signature(&jpeg(&vertical_split(), 75)).unwrap();

    let similarity = original.embedding.cosine_similarity(&compressed.embedding);
    assert!(similarity > 0.9, "similarity after JPEG: {similarity}");
}

#[test]
fn test_identical_photo_has_zero_distance() {
    let recognizer = recognizer();
    let a = recognizer.compute_signature(&png(&vertical_split())).unwrap();
    let b = recognizer.compute_signature(&png(&vertical_split())).unwrap();

    assert_eq!(a.hash.bit_len(), 512);
    assert_eq!(hamming_distance(&a.hash, &b.hash), 0);
    assert!((a.embedding.cosine_similarity(&b.embedding) - 1.0).abs() < 1e-5);
}

#[test]
fn test_inverted_photo_is_far_apart() {
    let recognizer = recognizer();
    let a = recognizer.compute_signature(&png(&vertical_split())).unwrap();
    let b = recognizer
        .compute_signature(&png(&invert(&vertical_split())))
        .unwrap();

    assert!(a.embedding.cosine_similarity(&b.embedding) < 0.0);
    assert!(hamming_distance(&a.hash, &b.hash) > 256);
}

// ============================================================================
// Enrollment and recognition
// ============================================================================

#[test]
fn test_recognizes_enrolled_cat() {
    let recognizer = recognizer();
    let mut catalog = enroll(
        &recognizer,
        1,
        vec![(10, png(&vertical_split())), (11, jpeg(&vertical_split(), 90))],
    );
    catalog.extend(enroll(&recognizer, 2, vec![(20, png(&horizontal_split()))]));

    let recognition = recognizer
        .recognize(&jpeg(&vertical_split(), 80), &catalog, Some("uploads/q1.jpg"))
        .unwrap();

    // One result per cat, and only confirmed matches once anything matched
    assert_eq!(recognition.results.len(), 1);
    let top = &recognition.results[0];
    assert_eq!(top.cat_id, Some(1));
    assert!(top.matched);
    assert!(top.reference_id == 10 || top.reference_id == 11);

    let event = &recognition.event;
    assert_eq!(event.cat_id(), Some(1));
    assert_eq!(event.query_image_path(), Some("uploads/q1.jpg"));
    assert_eq!(event.metadata().reference_count, 3);
    assert_eq!(event.query_hash_hex(), recognition.query_hash_hex);
}

#[test]
fn test_unknown_cat_gets_single_suggestion() {
    let recognizer = recognizer();
    let catalog = enroll(&recognizer, 2, vec![(20, png(&horizontal_split()))]);

    let recognition = recognizer
        .recognize(&png(&vertical_split()), &catalog, None)
        .unwrap();

    assert_eq!(recognition.results.len(), 1);
    let suggestion = recognition.suggestion().expect("expected a suggestion");
    assert_eq!(suggestion.cat_id, Some(2));
    assert!(suggestion.similarity < 0.75);
    assert_eq!(recognition.event.cat_id(), None);
    assert_eq!(recognition.event.metadata().suggested_cat_id, Some(2));
}

#[test]
fn test_hamming_prefilter_excludes_distant_references() {
    let recognizer = recognizer();
    recognizer.update_settings([("max_hamming", "100")]).unwrap();
    let catalog = enroll(&recognizer, 3, vec![(30, png(&invert(&vertical_split())))]);

    let recognition = recognizer
        .recognize(&png(&vertical_split()), &catalog, None)
        .unwrap();
    assert!(recognition.results.is_empty());
    assert_eq!(recognition.event.score(), None);
}

#[test]
fn test_undecodable_reference_is_skipped() {
    let recognizer = recognizer();
    let mut catalog = enroll(&recognizer, 1, vec![(10, png(&vertical_split()))]);
    let mut broken = catalog[0].clone();
    broken.reference_id = 99;
    broken.signature.embedding.truncate(5);
    catalog.push(broken);

    let recognition = recognizer
        .recognize(&png(&vertical_split()), &catalog, None)
        .unwrap();
    assert_eq!(recognition.results.len(), 1);
    assert_eq!(recognition.results[0].reference_id, 10);
    assert_eq!(recognition.event.metadata().reference_count, 2);
}

#[test]
fn test_canonical_signature_matches_query() {
    let recognizer = recognizer();
    let catalog = enroll(
        &recognizer,
        1,
        vec![
            (10, png(&vertical_split())),
            (11, jpeg(&vertical_split(), 85)),
            (12, png(&horizontal_split())),
        ],
    );

    let query = recognizer.compute_signature(&png(&vertical_split())).unwrap();

    // Excluding the odd photo brings the canonical signature closer
    let all = aggregate_references(&catalog, None);
    let curated = aggregate_references(&catalog, Some(&[10, 11][..]));
    let all_sim = query.embedding.cosine_similarity(all.embedding.as_ref().unwrap());
    let curated_sim = query
        .embedding
        .cosine_similarity(curated.embedding.as_ref().unwrap());

    assert!(curated_sim > 0.9, "curated similarity: {curated_sim}");
    assert!(curated_sim > all_sim);
    assert_eq!(curated.hash.unwrap().bit_len(), 512);
}

#[test]
fn test_corrupt_query_is_rejected() {
    let err = recognizer()
        .recognize(b"\xFF\xD8\xFF truncated", &[], None)
        .unwrap_err();
    assert!(matches!(err, WhiskerError::ImageDecode(_)));
}

// ============================================================================
// Settings and model reloads
// ============================================================================

#[test]
fn test_hash_length_change_requires_reprocess() {
    let recognizer = recognizer();
    let change = recognizer
        .update_settings([("hash_length_override", "128")])
        .unwrap();
    assert!(change.reprocess_required);

    let outcomes = recognizer.reprocess(vec![(1, png(&vertical_split())), (2, b"junk".to_vec())]);
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].result.as_ref().unwrap().hash.bit_len(), 128);
    assert!(outcomes[1].result.is_err());
}

#[cfg(feature = "onnx")]
#[test]
fn test_model_path_update_and_clear() {
    let dir = tempfile::tempdir().unwrap();
    let weights = dir.path().join("cat_embedding.onnx");
    std::fs::write(&weights, b"placeholder").unwrap();

    let recognizer = Recognizer::from_config(
        ExtractorConfig::default(),
        RecognitionSettings::default(),
    );
    let change = recognizer
        .update_settings([("model_path", weights.to_str().unwrap())])
        .unwrap();
    assert!(change.model_changed);
    assert!(change.reprocess_required);
    assert_eq!(recognizer.settings().model_path.as_deref(), Some(weights.as_path()));

    // Unloadable weights keep the extractor serving from the fallback
    assert!(matches!(
        recognizer.extractor().model_source(),
        ModelSource::Projection { .. }
    ));

    let change = recognizer.update_settings([("model_path", "")]).unwrap();
    assert!(change.model_changed);
    assert_eq!(recognizer.settings().model_path, None);
}

#[cfg(not(feature = "onnx"))]
#[test]
fn test_model_path_rejected_without_backend() {
    let dir = tempfile::tempdir().unwrap();
    let weights = dir.path().join("cat_embedding.onnx");
    std::fs::write(&weights, b"placeholder").unwrap();

    let recognizer = Recognizer::from_config(
        ExtractorConfig::default(),
        RecognitionSettings::default(),
    );
    let err = recognizer
        .update_settings([("model_path", weights.to_str().unwrap()), ("threshold", "0.8")])
        .unwrap_err();
    assert_eq!(err.invalid_fields(), vec!["model_path"]);

    // Nothing changed, so nothing needs reprocessing
    assert_eq!(recognizer.settings().model_path, None);
    assert_eq!(recognizer.settings().threshold, 0.75);
    assert!(matches!(
        recognizer.extractor().model_source(),
        ModelSource::Projection { .. }
    ));
}

#[test]
fn test_embedding_during_weight_swaps() {
    let dir = tempfile::tempdir().unwrap();
    let weights = dir.path().join("weights.onnx");
    std::fs::write(&weights, b"placeholder").unwrap();

    let extractor = FeatureExtractor::default();
    let photo = Arc::new(png(&vertical_split()));

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let extractor = extractor.clone();
            let photo = Arc::clone(&photo);
            scope.spawn(move || {
                for _ in 0..3 {
                    let embedding = extractor.embed(&photo).unwrap();
                    assert_eq!(embedding.len(), 512);
                }
            });
        }

        scope.spawn(|| {
            for _ in 0..3 {
                // Without an ONNX backend only clearing swaps the model
                let _ = extractor.set_weights(&weights);
                extractor.clear_weights();
            }
        });
    });

    assert_eq!(extractor.embedding_dim(), 512);
}
