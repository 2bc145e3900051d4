//! Minimal reader for the long-form Praat TextGrid text format.
//!
//! Only interval tiers are read, and only the `xmin`, `xmax` and `text`
//! fields of their intervals.

use regex::Regex;
use std::sync::LazyLock;

static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"item \[\d+\]:").expect("valid item pattern"));
static TIER_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\s*class = "IntervalTier"\s*name = "(.*?)"\s*xmin = [\d.]+\s*xmax = [\d.]+\s*intervals: size = \d+"#,
    )
    .expect("valid tier header pattern")
});
static INTERVAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"xmin = ([\d.]+)\s*xmax = ([\d.]+)\s*text = "(.*?)""#)
        .expect("valid interval pattern")
});

/// A labelled span of a tier, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub xmin: f64,
    pub xmax: f64,
    pub text: String,
}

/// Intervals of the first interval tier named `tier` whose text is not
/// blank, in file order. A missing tier yields no intervals.
pub fn parse_textgrid(content: &str, tier: &str) -> Vec<Interval> {
    let body = ITEM_RE.split(content).skip(1).find_map(|item| {
        let header = TIER_HEADER_RE.captures(item)?;
        let end = header.get(0)?.end();
        (&header[1] == tier).then(|| &item[end..])
    });
    let Some(body) = body else {
        return Vec::new();
    };

    INTERVAL_RE
        .captures_iter(body)
        .filter_map(|caps| {
            let text = caps[3].to_string();
            if text.trim().is_empty() {
                return None;
            }
            Some(Interval {
                xmin: caps[1].parse().ok()?,
                xmax: caps[2].parse().ok()?,
                text,
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Build a long-form TextGrid with the given interval tiers, in order.
    pub fn textgrid_with_tiers(tiers: &[(&str, &[(f64, f64, &str)])]) -> String {
        let end = tiers
            .iter()
            .filter_map(|(_, intervals)| intervals.last().map(|i| i.1))
            .fold(0.0_f64, f64::max);
        let mut out = format!(
            "File type = \"ooTextFile\"\nObject class = \"TextGrid\"\n\nxmin = 0\nxmax = {end}\ntiers? <exists>\nsize = {}\nitem []:\n",
            tiers.len()
        );
        for (number, (name, intervals)) in tiers.iter().enumerate() {
            out.push_str(&format!(
                "    item [{}]:\n        class = \"IntervalTier\"\n        name = \"{name}\"\n        xmin = 0\n        xmax = {end}\n        intervals: size = {}\n",
                number + 1,
                intervals.len()
            ));
            for (idx, (xmin, xmax, text)) in intervals.iter().enumerate() {
                out.push_str(&format!(
                    "        intervals [{}]:\n            xmin = {xmin}\n            xmax = {xmax}\n            text = \"{text}\"\n",
                    idx + 1
                ));
            }
        }
        out
    }

    /// A `Words` tier followed by `tier`.
    pub fn textgrid(tier: &str, intervals: &[(f64, f64, &str)]) -> String {
        let end = intervals.last().map_or(0.0, |i| i.1);
        textgrid_with_tiers(&[("Words", &[(0.0, end, "words")]), (tier, intervals)])
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{textgrid, textgrid_with_tiers};
    use super::*;

    #[test]
    fn reads_named_tier_when_it_is_last() {
        let content = textgrid("Phrases", &[(0.0, 1.0, "a"), (1.0, 1.5, ""), (1.5, 3.0, "b")]);
        let intervals = parse_textgrid(&content, "Phrases");
        assert_eq!(
            intervals,
            vec![
                Interval { xmin: 0.0, xmax: 1.0, text: "a".into() },
                Interval { xmin: 1.5, xmax: 3.0, text: "b".into() },
            ]
        );
    }

    #[test]
    fn stops_at_the_next_tier() {
        let content = textgrid_with_tiers(&[
            ("Phrases", &[(0.0, 2.0, "hello")]),
            ("Words", &[(0.0, 1.0, "hel"), (1.0, 2.0, "lo")]),
        ]);
        let intervals = parse_textgrid(&content, "Phrases");
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].text, "hello");
    }

    #[test]
    fn missing_tier_yields_nothing() {
        let content = textgrid("Syllables", &[(0.0, 1.0, "ba")]);
        assert!(parse_textgrid(&content, "Phrases").is_empty());
    }

    #[test]
    fn whitespace_only_text_is_dropped() {
        let content = textgrid("Phrases", &[(0.0, 1.0, "   "), (1.0, 2.0, "hi")]);
        assert_eq!(parse_textgrid(&content, "Phrases").len(), 1);
    }
}
