//! Wildcard matching for path segments.
//!
//! Only `*` is special: it matches any run of characters, including none.
//! Matching is case-sensitive and anchored at both ends.

/// Match a name against a `*` wildcard pattern.
pub fn wildcard_match(pattern: &str, input: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = input.chars().collect();

    let (mut p, mut t) = (0usize, 0usize);
    // Position of the last `*` seen and the text index it was tried against.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pat.len() && pat[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pat.len() && pat[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star, matched)) = backtrack {
            // Let the last star absorb one more character and retry.
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pat[p..].iter().all(|&c| c == '*')
}
