//! ONNX recognition backend
//!
//! Runs the detection model over the whole image, cuts out each detected
//! region, and reads it with the recognition model. Recognition output is
//! CTC-decoded against the character dictionary. Fragments are returned in
//! reading order: top-to-bottom, then left-to-right within a line.

use anyhow::{Context, Result};
use image::RgbImage;
use ort::value::Tensor;
use tracing::{debug, warn};

use super::models::{load_dictionary, ModelKind, ModelStore, OnnxSession};
use super::preprocess::{self, Normalization};
use super::recognizer::{Fragment, Recognizer};

/// Tunables for the ONNX backend.
#[derive(Debug, Clone)]
pub struct OnnxRecognizerConfig {
    /// Longest side fed to the detection model.
    pub detection_size: u32,
    /// Probability threshold for the detection map.
    pub detection_threshold: f32,
    /// Regions smaller than this (map pixels, either side) are noise.
    pub min_region_side: u32,
    /// Padding added around a detected region before cropping, in original
    /// image pixels. Detection maps shrink text slightly.
    pub region_padding: u32,
    /// Fixed input height of the recognition model.
    pub recognition_height: u32,
    /// Maximum input width of the recognition model.
    pub recognition_max_width: u32,
}

impl Default for OnnxRecognizerConfig {
    fn default() -> Self {
        Self {
            detection_size: 960,
            detection_threshold: 0.3,
            min_region_side: 3,
            region_padding: 4,
            recognition_height: 48,
            recognition_max_width: 640,
        }
    }
}

/// A detected text region in original-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Detection + recognition backend over ONNX Runtime.
pub struct OnnxRecognizer {
    detector: OnnxSession,
    recognizer: OnnxSession,
    dictionary: Vec<String>,
    language: String,
    config: OnnxRecognizerConfig,
    normalization: Normalization,
}

impl OnnxRecognizer {
    /// Load the backend for one language, downloading missing model files
    /// through the store.
    pub fn load(store: &ModelStore, language: &str, config: OnnxRecognizerConfig) -> Result<Self> {
        let detector = OnnxSession::new(&store.ensure(ModelKind::Detection, language)?)?;
        let recognizer = OnnxSession::new(&store.ensure(ModelKind::Recognition, language)?)?;
        let dictionary = load_dictionary(&store.ensure(ModelKind::Dictionary, language)?)?;

        Ok(Self {
            detector,
            recognizer,
            dictionary,
            language: language.to_string(),
            config,
            normalization: Normalization::default(),
        })
    }

    /// Find text regions in the image, mapped back to image coordinates.
    fn detect_regions(&mut self, img: &RgbImage) -> Result<Vec<TextRegion>> {
        let input = preprocess::prepare_for_detection(
            img,
            self.config.detection_size,
            &self.normalization,
        );
        let scale = input.scale;
        let (b, c, h, w) = input.tensor.dim();
        let data = input.tensor.into_raw_vec_and_offset().0;

        let input_name = self.detector.input_names()[0].clone();
        let output_name = self.detector.output_names()[0].clone();
        let tensor = Tensor::from_array((vec![b, c, h, w], data))?;
        let outputs = self
            .detector
            .session_mut()
            .run(ort::inputs![input_name.as_str() => tensor])?;
        let output = outputs
            .get(output_name.as_str())
            .context("detection model produced no output")?;
        let (shape, probs) = output.try_extract_tensor::<f32>()?;

        // The probability map matches the padded input resolution.
        let rank = shape.len();
        anyhow::ensure!(rank >= 2, "unexpected detection output rank {rank}");
        let map_h = shape[rank - 2] as usize;
        let map_w = shape[rank - 1] as usize;

        let raw = regions_from_probability_map(
            probs,
            map_w,
            map_h,
            self.config.detection_threshold,
            self.config.min_region_side,
        );
        debug!(regions = raw.len(), "detection complete");

        let (img_w, img_h) = img.dimensions();
        let pad = self.config.region_padding;
        Ok(raw
            .into_iter()
            .filter_map(|r| scale_region_to_image(r, scale, pad, img_w, img_h))
            .collect())
    }

    /// Read one cropped region; `None` when the model sees no characters.
    fn read_region(&mut self, crop: &RgbImage) -> Result<Option<Fragment>> {
        let tensor = preprocess::prepare_for_recognition(
            crop,
            self.config.recognition_height,
            self.config.recognition_max_width,
            &self.normalization,
        );
        let (b, c, h, w) = tensor.dim();
        let data = tensor.into_raw_vec_and_offset().0;

        let input_name = self.recognizer.input_names()[0].clone();
        let output_name = self.recognizer.output_names()[0].clone();
        let tensor = Tensor::from_array((vec![b, c, h, w], data))?;
        let outputs = self
            .recognizer
            .session_mut()
            .run(ort::inputs![input_name.as_str() => tensor])?;
        let output = outputs
            .get(output_name.as_str())
            .context("recognition model produced no output")?;
        let (shape, probs) = output.try_extract_tensor::<f32>()?;

        anyhow::ensure!(
            shape.len() == 3,
            "unexpected recognition output rank {}",
            shape.len()
        );
        let steps = shape[1] as usize;
        let classes = shape[2] as usize;

        let (text, confidence) = ctc_greedy_decode(probs, steps, classes, &self.dictionary);
        if text.is_empty() {
            return Ok(None);
        }
        Ok(Some(Fragment::new(text, confidence)))
    }
}

impl Recognizer for OnnxRecognizer {
    fn name(&self) -> &'static str {
        "onnx"
    }

    fn recognize(&mut self, png: &[u8], languages: &[String]) -> Result<Vec<Fragment>> {
        if !languages.iter().any(|l| l == &self.language) {
            warn!(
                loaded = %self.language,
                requested = ?languages,
                "backend loaded for a different language set"
            );
        }

        let img = image::load_from_memory(png)
            .context("decoding image for recognition")?
            .to_rgb8();

        let regions = sort_reading_order(self.detect_regions(&img)?);

        let mut fragments = Vec::with_capacity(regions.len());
        for region in regions {
            let crop = image::imageops::crop_imm(&img, region.x, region.y, region.width, region.height)
                .to_image();
            if let Some(fragment) = self.read_region(&crop)? {
                fragments.push(fragment);
            }
        }
        debug!(fragments = fragments.len(), "recognition pass complete");
        Ok(fragments)
    }
}

/// Extract bounding boxes of connected components above `threshold` from a
/// row-major probability map.
pub fn regions_from_probability_map(
    probs: &[f32],
    width: usize,
    height: usize,
    threshold: f32,
    min_side: u32,
) -> Vec<TextRegion> {
    if width == 0 || height == 0 || probs.len() < width * height {
        return Vec::new();
    }

    let mut visited = vec![false; width * height];
    let mut regions = Vec::new();
    let mut stack = Vec::new();

    for start in 0..width * height {
        if visited[start] || probs[start] < threshold {
            continue;
        }

        let (mut min_x, mut min_y) = (start % width, start / width);
        let (mut max_x, mut max_y) = (min_x, min_y);

        visited[start] = true;
        stack.push(start);
        while let Some(idx) = stack.pop() {
            let x = idx % width;
            let y = idx / width;
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);

            // 4-connectivity
            let mut push = |nx: usize, ny: usize| {
                let nidx = ny * width + nx;
                if !visited[nidx] && probs[nidx] >= threshold {
                    visited[nidx] = true;
                    stack.push(nidx);
                }
            };
            if x > 0 {
                push(x - 1, y);
            }
            if x + 1 < width {
                push(x + 1, y);
            }
            if y > 0 {
                push(x, y - 1);
            }
            if y + 1 < height {
                push(x, y + 1);
            }
        }

        let region = TextRegion {
            x: min_x as u32,
            y: min_y as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        };
        if region.width >= min_side && region.height >= min_side {
            regions.push(region);
        }
    }

    regions
}

/// Map a region from detection-map coordinates back to the original image,
/// expanding by `pad` pixels and clamping to the image bounds. Degenerate
/// results are dropped.
fn scale_region_to_image(
    region: TextRegion,
    scale: f32,
    pad: u32,
    img_w: u32,
    img_h: u32,
) -> Option<TextRegion> {
    if scale <= 0.0 {
        return None;
    }
    let inv = 1.0 / scale;
    let x = ((region.x as f32 * inv) as u32).saturating_sub(pad);
    let y = ((region.y as f32 * inv) as u32).saturating_sub(pad);
    let right = (((region.x + region.width) as f32 * inv) as u32 + pad).min(img_w);
    let bottom = (((region.y + region.height) as f32 * inv) as u32 + pad).min(img_h);

    if right <= x || bottom <= y {
        return None;
    }
    Some(TextRegion {
        x,
        y,
        width: right - x,
        height: bottom - y,
    })
}

/// Order regions top-to-bottom, grouping regions whose vertical centers
/// fall within each other's extent into one line sorted left-to-right.
pub fn sort_reading_order(mut regions: Vec<TextRegion>) -> Vec<TextRegion> {
    regions.sort_by_key(|r| r.y + r.height / 2);

    let mut lines: Vec<Vec<TextRegion>> = Vec::new();
    for region in regions {
        let center = region.y + region.height / 2;
        match lines.last_mut() {
            Some(line) => {
                let anchor = line[0];
                if center >= anchor.y && center < anchor.y + anchor.height {
                    line.push(region);
                } else {
                    lines.push(vec![region]);
                }
            }
            None => lines.push(vec![region]),
        }
    }

    let mut ordered = Vec::new();
    for mut line in lines {
        line.sort_by_key(|r| r.x);
        ordered.extend(line);
    }
    ordered
}

/// Greedy CTC decoding: argmax per timestep, collapse repeats, drop blanks
/// (class 0). Classes index into the dictionary at `class - 1`. Returns the
/// decoded text and the mean probability of the kept characters.
pub fn ctc_greedy_decode(
    probs: &[f32],
    steps: usize,
    classes: usize,
    dictionary: &[String],
) -> (String, f32) {
    let mut text = String::new();
    let mut kept_probs = Vec::new();
    let mut last_class = 0usize;

    for step in 0..steps {
        let row = &probs[step * classes..(step + 1) * classes];
        let (best_class, best_prob) = row
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |(bi, bp), (i, &p)| {
                if p > bp {
                    (i, p)
                } else {
                    (bi, bp)
                }
            });

        if best_class != 0 && best_class != last_class {
            if let Some(entry) = dictionary.get(best_class - 1) {
                text.push_str(entry);
                kept_probs.push(best_prob);
            }
        }
        last_class = best_class;
    }

    let confidence = if kept_probs.is_empty() {
        0.0
    } else {
        kept_probs.iter().sum::<f32>() / kept_probs.len() as f32
    };
    (text, confidence)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_probability_map_finds_separate_blobs() {
        // 8x4 map with two 2x2 blobs.
        let mut probs = vec![0.0f32; 8 * 4];
        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            probs[y * 8 + x] = 0.9;
        }
        for (x, y) in [(5, 1), (6, 1), (5, 2), (6, 2)] {
            probs[y * 8 + x] = 0.8;
        }

        let regions = regions_from_probability_map(&probs, 8, 4, 0.3, 2);
        assert_eq!(regions.len(), 2);
        assert!(regions.contains(&TextRegion {
            x: 1,
            y: 1,
            width: 2,
            height: 2
        }));
        assert!(regions.contains(&TextRegion {
            x: 5,
            y: 1,
            width: 2,
            height: 2
        }));
    }

    #[test]
    fn test_probability_map_drops_tiny_noise() {
        let mut probs = vec![0.0f32; 8 * 4];
        probs[2 * 8 + 3] = 0.99; // single pixel

        let regions = regions_from_probability_map(&probs, 8, 4, 0.3, 2);
        assert!(regions.is_empty());
    }

    #[test]
    fn test_probability_map_empty_when_all_below_threshold() {
        let probs = vec![0.1f32; 16];
        assert!(regions_from_probability_map(&probs, 4, 4, 0.3, 1).is_empty());
    }

    #[test]
    fn test_reading_order_is_rows_then_columns() {
        let a = TextRegion { x: 50, y: 0, width: 20, height: 10 };
        let b = TextRegion { x: 0, y: 2, width: 20, height: 10 };
        let c = TextRegion { x: 10, y: 30, width: 20, height: 10 };

        let ordered = sort_reading_order(vec![c, a, b]);
        // a and b share a line; b is further left.
        assert_eq!(ordered, vec![b, a, c]);
    }

    #[test]
    fn test_ctc_collapses_repeats_and_blanks() {
        let d = dict(&["a", "b"]);
        // Classes: 0 = blank, 1 = "a", 2 = "b".
        // Timesteps: a a blank a b  ->  "aab"
        #[rustfmt::skip]
        let probs = vec![
            0.1, 0.8, 0.1, // a
            0.1, 0.8, 0.1, // a (repeat, collapsed)
            0.9, 0.05, 0.05, // blank
            0.1, 0.7, 0.2, // a (new after blank)
            0.1, 0.2, 0.7, // b
        ];
        let (text, confidence) = ctc_greedy_decode(&probs, 5, 3, &d);
        assert_eq!(text, "aab");
        assert!(confidence > 0.5);
    }

    #[test]
    fn test_ctc_all_blank_is_empty_text() {
        let d = dict(&["a"]);
        let probs = vec![0.9, 0.1, 0.9, 0.1];
        let (text, confidence) = ctc_greedy_decode(&probs, 2, 2, &d);
        assert_eq!(text, "");
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn test_ctc_ignores_classes_beyond_dictionary() {
        let d = dict(&["a"]);
        // Class 2 has no dictionary entry (dict has one entry for class 1).
        let probs = vec![0.0, 0.1, 0.9];
        let (text, _) = ctc_greedy_decode(&probs, 1, 3, &d);
        assert_eq!(text, "");
    }

    #[test]
    fn test_region_scaling_adds_padding_and_clamps() {
        let region = TextRegion { x: 10, y: 10, width: 20, height: 10 };
        let scaled = scale_region_to_image(region, 0.5, 2, 100, 45).unwrap();
        assert_eq!(scaled.x, 18);
        assert_eq!(scaled.y, 18);
        assert_eq!(scaled.x + scaled.width, 62);
        // Bottom edge clamps to the image height.
        assert_eq!(scaled.y + scaled.height, 42);
    }
}
