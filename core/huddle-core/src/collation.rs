//! Locale-aware, case-insensitive name ordering.
//!
//! Names are lowercased and decomposed (NFD) into clusters of a base character
//! followed by its combining marks. Each cluster contributes a primary weight
//! (which letter it is) and a secondary weight (which accents it carries).
//! Keys compare primary weights first, then secondary, then the raw string, so
//! the order is total and deterministic.
//!
//! Vietnamese treats ă, â, đ, ê, ô, ơ and ư as letters of their own and orders
//! tones as: none < huyền (`à`) < hỏi (`ả`) < ngã (`ã`) < sắc (`á`) < nặng (`ạ`).

use std::cmp::Ordering;
use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollationLocale {
    /// Base letters by code point, accents as tie-breakers.
    Root,
    #[default]
    Vietnamese,
}

impl CollationLocale {
    pub fn key(self, name: &str) -> CollationKey {
        collation_key(self, name)
    }

    pub fn compare(self, a: &str, b: &str) -> Ordering {
        collation_key(self, a).cmp(&collation_key(self, b))
    }
}

/// Sort key for a name under one locale.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CollationKey {
    primary: Vec<(u8, u32)>,
    secondary: Vec<Vec<u32>>,
    raw: String,
}

const BREVE: char = '\u{0306}';
const CIRCUMFLEX: char = '\u{0302}';
const HORN: char = '\u{031B}';

const GRAVE: char = '\u{0300}';
const HOOK_ABOVE: char = '\u{0309}';
const TILDE: char = '\u{0303}';
const ACUTE: char = '\u{0301}';
const DOT_BELOW: char = '\u{0323}';

// Primary weight groups: separators sort before digits, digits before letters.
const GROUP_SEPARATOR: u8 = 0;
const GROUP_DIGIT: u8 = 1;
const GROUP_LETTER: u8 = 2;
const GROUP_OTHER: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Modifier {
    Plain,
    Breve,
    Circumflex,
    Horn,
}

static VIETNAMESE_ALPHABET: Lazy<HashMap<(char, Modifier), u32>> = Lazy::new(|| {
    use Modifier::*;
    let letters = [
        ('a', Plain),
        ('a', Breve),
        ('a', Circumflex),
        ('b', Plain),
        ('c', Plain),
        ('d', Plain),
        ('đ', Plain),
        ('e', Plain),
        ('e', Circumflex),
        ('f', Plain),
        ('g', Plain),
        ('h', Plain),
        ('i', Plain),
        ('j', Plain),
        ('k', Plain),
        ('l', Plain),
        ('m', Plain),
        ('n', Plain),
        ('o', Plain),
        ('o', Circumflex),
        ('o', Horn),
        ('p', Plain),
        ('q', Plain),
        ('r', Plain),
        ('s', Plain),
        ('t', Plain),
        ('u', Plain),
        ('u', Horn),
        ('v', Plain),
        ('w', Plain),
        ('x', Plain),
        ('y', Plain),
        ('z', Plain),
    ];
    letters
        .iter()
        .enumerate()
        .map(|(rank, letter)| (*letter, rank as u32))
        .collect()
});

struct Cluster {
    base: char,
    marks: Vec<char>,
}

fn clusters(name: &str) -> Vec<Cluster> {
    let mut out: Vec<Cluster> = Vec::new();
    for c in name.to_lowercase().nfd() {
        if is_combining_mark(c) {
            if let Some(last) = out.last_mut() {
                last.marks.push(c);
                continue;
            }
        }
        out.push(Cluster {
            base: c,
            marks: Vec::new(),
        });
    }
    out
}

fn base_weight(c: char) -> (u8, u32) {
    if c.is_whitespace() || c.is_ascii_punctuation() {
        (GROUP_SEPARATOR, c as u32)
    } else if let Some(digit) = c.to_digit(10) {
        (GROUP_DIGIT, digit)
    } else if c.is_ascii_alphabetic() {
        (GROUP_LETTER, c as u32)
    } else {
        (GROUP_OTHER, c as u32)
    }
}

fn modifier_for(mark: char) -> Option<Modifier> {
    match mark {
        BREVE => Some(Modifier::Breve),
        CIRCUMFLEX => Some(Modifier::Circumflex),
        HORN => Some(Modifier::Horn),
        _ => None,
    }
}

fn tone_for(mark: char) -> Option<u32> {
    match mark {
        GRAVE => Some(1),
        HOOK_ABOVE => Some(2),
        TILDE => Some(3),
        ACUTE => Some(4),
        DOT_BELOW => Some(5),
        _ => None,
    }
}

fn weigh_vietnamese(cluster: &Cluster) -> ((u8, u32), Vec<u32>) {
    let mut modifier = Modifier::Plain;
    let mut tone = 0;
    let mut extra = Vec::new();

    for &mark in &cluster.marks {
        let as_letter = modifier_for(mark)
            .filter(|m| {
                modifier == Modifier::Plain
                    && VIETNAMESE_ALPHABET.contains_key(&(cluster.base, *m))
            });
        if let Some(m) = as_letter {
            modifier = m;
            continue;
        }
        match tone_for(mark) {
            Some(t) if tone == 0 => tone = t,
            _ => extra.push(mark as u32),
        }
    }

    let primary = match VIETNAMESE_ALPHABET.get(&(cluster.base, modifier)) {
        Some(rank) => (GROUP_LETTER, *rank),
        None => base_weight(cluster.base),
    };

    let mut secondary = vec![tone];
    secondary.extend(extra);
    (primary, secondary)
}

fn weigh_root(cluster: &Cluster) -> ((u8, u32), Vec<u32>) {
    let mut secondary: Vec<u32> = cluster.marks.iter().map(|m| *m as u32).collect();
    let primary = if cluster.base == 'đ' {
        secondary.insert(0, 'đ' as u32);
        base_weight('d')
    } else {
        base_weight(cluster.base)
    };
    (primary, secondary)
}

pub fn collation_key(locale: CollationLocale, name: &str) -> CollationKey {
    let mut primary = Vec::new();
    let mut secondary = Vec::new();

    for cluster in clusters(name) {
        let (p, s) = match locale {
            CollationLocale::Vietnamese => weigh_vietnamese(&cluster),
            CollationLocale::Root => weigh_root(&cluster),
        };
        primary.push(p);
        secondary.push(s);
    }

    CollationKey {
        primary,
        secondary,
        raw: name.to_string(),
    }
}
