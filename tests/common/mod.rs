#![allow(dead_code)]

use std::path::Path;

use prosodyzer::types::Waveform;

pub fn write_tone(path: &Path, freq: f32, seconds: f32, sample_rate: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for sample in tone(freq, seconds, sample_rate).samples {
        writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

pub fn tone(freq: f32, seconds: f32, sample_rate: u32) -> Waveform {
    let total = (sample_rate as f32 * seconds) as usize;
    let samples = (0..total)
        .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin() * 0.4)
        .collect();
    Waveform::new(samples, sample_rate)
}

pub fn wav_len(path: &Path) -> u32 {
    hound::WavReader::open(path).unwrap().duration()
}

/// Long-form TextGrid with a `Words` tier followed by a `Phrases` tier.
pub fn phrases_textgrid(intervals: &[(f64, f64, &str)]) -> String {
    let end = intervals.last().map_or(0.0, |i| i.1);
    let mut out = format!(
        "File type = \"ooTextFile\"\nObject class = \"TextGrid\"\n\nxmin = 0\nxmax = {end}\ntiers? <exists>\nsize = 2\nitem []:\n\
         \x20   item [1]:\n        class = \"IntervalTier\"\n        name = \"Words\"\n        xmin = 0\n        xmax = {end}\n        intervals: size = 1\n\
         \x20       intervals [1]:\n            xmin = 0\n            xmax = {end}\n            text = \"words\"\n\
         \x20   item [2]:\n        class = \"IntervalTier\"\n        name = \"Phrases\"\n        xmin = 0\n        xmax = {end}\n        intervals: size = {}\n",
        intervals.len()
    );
    for (idx, (xmin, xmax, text)) in intervals.iter().enumerate() {
        out.push_str(&format!(
            "        intervals [{}]:\n            xmin = {xmin}\n            xmax = {xmax}\n            text = \"{text}\"\n",
            idx + 1
        ));
    }
    out
}
