//! Shared matcher for the `containing_pattern` query family.

/// A compiled name pattern. `subsequence` matches pattern characters in order
/// but not necessarily adjacent; otherwise the pattern must appear as a
/// contiguous substring. Anchors pin the match to the start/end of the
/// candidate.
pub struct PatternMatcher {
    pattern: String,
    anchor_start: bool,
    anchor_end: bool,
    subsequence: bool,
    ignore_case: bool,
}

impl PatternMatcher {
    pub fn new(
        pattern: &str,
        anchor_start: bool,
        anchor_end: bool,
        subsequence: bool,
        ignore_case: bool,
    ) -> Self {
        let pattern = if ignore_case {
            pattern.to_lowercase()
        } else {
            pattern.to_owned()
        };
        Self {
            pattern,
            anchor_start,
            anchor_end,
            subsequence,
            ignore_case,
        }
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        let folded;
        let candidate = if self.ignore_case {
            folded = candidate.to_lowercase();
            folded.as_str()
        } else {
            candidate
        };

        if self.pattern.is_empty() {
            return true;
        }

        if self.subsequence {
            return self.is_subsequence_match(candidate);
        }

        match (self.anchor_start, self.anchor_end) {
            (true, true) => candidate == self.pattern,
            (true, false) => candidate.starts_with(&self.pattern),
            (false, true) => candidate.ends_with(&self.pattern),
            (false, false) => candidate.contains(&self.pattern),
        }
    }

    fn is_subsequence_match(&self, candidate: &str) -> bool {
        let mut pattern = self.pattern.chars().peekable();
        let mut first = true;
        for ch in candidate.chars() {
            let Some(&next) = pattern.peek() else {
                break;
            };
            if ch == next {
                pattern.next();
            } else if first && self.anchor_start {
                // An anchored subsequence must consume the first candidate
                // character.
                return false;
            }
            first = false;
        }
        if pattern.peek().is_some() {
            return false;
        }
        if self.anchor_end {
            let last_pattern = self.pattern.chars().next_back();
            let last_candidate = candidate.chars().next_back();
            return last_pattern == last_candidate;
        }
        true
    }
}
