//! Metadata encoded in corpus file names.
//!
//! Recordings carry their study design in the file name: speech register
//! (`IDS`/`ADS`), preprocessing condition (`original`/`denoised`/`enhanced`),
//! speaker (`Baby <n>`), synthesis sample (`GILES_<n>`), the `xtts_` prefix
//! of synthesized audio and the `_phrase_<n>` suffix added by segmentation.
//! Names are parsed once here; everything else reads the fields.

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const SYNTHESIS_PREFIX: &str = "xtts_";

static SPEAKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Baby (\d+)").expect("valid speaker pattern"));
static SYNTH_INDEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"GILES_(\d+)").expect("valid synthesis index pattern"));
static PHRASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)_(phrase_\d+)$").expect("valid phrase pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Reference,
    Synthesis,
}

impl Source {
    /// Directory name used for this source under the corpus roots.
    pub fn dir_name(self) -> &'static str {
        match self {
            Source::Reference => "references",
            Source::Synthesis => "syntheses",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Source::Reference => "reference",
            Source::Synthesis => "synthesis",
        }
    }

    /// Classify a path by the `references`/`syntheses` directory it lives under.
    pub fn from_path(path: &Path) -> Option<Self> {
        let text = path.to_string_lossy();
        if text.contains("references") {
            Some(Source::Reference)
        } else if text.contains("syntheses") {
            Some(Source::Synthesis)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Ids,
    Ads,
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::Ids => write!(f, "IDS"),
            Register::Ads => write!(f, "ADS"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    Original,
    Denoised,
    Enhanced,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Original => write!(f, "original"),
            Condition::Denoised => write!(f, "denoised"),
            Condition::Enhanced => write!(f, "enhanced"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub file_name: String,
    pub stem: String,
    pub source: Source,
    /// Stem without the synthesis prefix and phrase suffix.
    pub base_file: String,
    /// File name of the whole clip this file was cut from (itself if not a phrase).
    pub clip_name: String,
    pub phrase: Option<String>,
    pub register: Option<Register>,
    pub condition: Option<Condition>,
    pub speaker: Option<u32>,
    pub synthesis_index: Option<u32>,
}

impl FileMetadata {
    /// Parse a bare file name or a path (only the final component is used).
    pub fn parse(name: &str) -> Self {
        let file_name = Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        let stem = Path::new(&file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.clone());

        let (clip_stem, phrase) = match PHRASE_RE.captures(&stem) {
            Some(caps) => (caps[1].to_string(), Some(caps[2].to_string())),
            None => (stem.clone(), None),
        };

        let (source, base_file) = match clip_stem.strip_prefix(SYNTHESIS_PREFIX) {
            Some(rest) => (Source::Synthesis, rest.to_string()),
            None => (Source::Reference, clip_stem.clone()),
        };

        Self {
            clip_name: format!("{clip_stem}.wav"),
            register: parse_register(&stem),
            condition: parse_condition(&stem),
            speaker: capture_number(&SPEAKER_RE, &stem),
            synthesis_index: capture_number(&SYNTH_INDEX_RE, &stem),
            file_name,
            stem,
            source,
            base_file,
            phrase,
        }
    }

    /// Group label such as `IDS_enhanced_synthesis`.
    pub fn group_label(&self) -> String {
        let register = self
            .register
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let condition = self
            .condition
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        format!("{register}_{condition}_{}", self.source.label())
    }
}

fn parse_register(stem: &str) -> Option<Register> {
    if stem.contains("IDS") {
        Some(Register::Ids)
    } else if stem.contains("ADS") {
        Some(Register::Ads)
    } else {
        None
    }
}

// "denoised" is checked first: a denoised clip may still mention "original" elsewhere.
fn parse_condition(stem: &str) -> Option<Condition> {
    if stem.contains("denoised") {
        Some(Condition::Denoised)
    } else if stem.contains("enhanced") {
        Some(Condition::Enhanced)
    } else if stem.contains("original") {
        Some(Condition::Original)
    } else {
        None
    }
}

fn capture_number(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text).and_then(|caps| caps[1].parse().ok())
}
