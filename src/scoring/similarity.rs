/// Score points lost per extracted substring beyond the first, and the
/// minimum share (percent of the longer text) a common substring must
/// exceed to be extracted.
const PENALTY: usize = 2;

/// Longest common contiguous run of `x` and `y`, as a slice of `x`.
/// The first run found wins ties.
pub fn longest_common_substring<'a>(x: &'a [char], y: &[char]) -> &'a [char] {
    let mut prev = vec![0usize; y.len() + 1];
    let mut curr = vec![0usize; y.len() + 1];
    let mut max = 0;
    let mut end = 0;

    for i in 1..=x.len() {
        for j in 1..=y.len() {
            if x[i - 1] == y[j - 1] {
                curr[j] = prev[j - 1] + 1;
                if curr[j] > max {
                    max = curr[j];
                    end = i;
                }
            } else {
                curr[j] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    &x[end - max..end]
}

fn remove_first(haystack: &mut Vec<char>, needle: &[char]) {
    if needle.is_empty() || needle.len() > haystack.len() {
        return;
    }
    if let Some(idx) = haystack.windows(needle.len()).position(|w| w == needle) {
        haystack.drain(idx..idx + needle.len());
    }
}

/// Similarity of two texts on a 0-100 scale.
///
/// The longest common substring is cut out of both texts over and over
/// until what is left shares nothing longer than 2% of the longer text.
/// The score is the share of the longer text that was cut out, minus
/// `PENALTY` points for every extraction after the first.
pub fn similarity(one: &str, two: &str) -> u8 {
    let x: Vec<char> = one.trim().chars().collect();
    let y: Vec<char> = two.trim().chars().collect();

    let longest = x.len().max(y.len());
    if longest == 0 {
        return 0;
    }

    // `a` is the longer text; equal lengths are ordered so that the score
    // doesn't depend on argument order.
    let (mut a, mut b) = if x.len() > y.len() || (x.len() == y.len() && x <= y) {
        (x, y)
    } else {
        (y, x)
    };

    let threshold = longest * PENALTY / 100;
    let mut extractions = 0usize;
    loop {
        let common = longest_common_substring(&a, &b).to_vec();
        if common.iter().all(|c| c.is_whitespace()) || common.len() <= threshold {
            break;
        }
        remove_first(&mut a, &common);
        remove_first(&mut b, &common);
        extractions += 1;
    }

    let extracted = 100 * (longest - a.len()) / longest;
    let penalty = PENALTY * extractions.saturating_sub(1);
    extracted.saturating_sub(penalty).min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn common_substring_is_contiguous() {
        let x = chars("abcdxyz");
        let y = chars("xyzabcd");
        assert_eq!(longest_common_substring(&x, &y), chars("abcd").as_slice());

        let x = chars("axbxc");
        let y = chars("abc");
        assert_eq!(longest_common_substring(&x, &y).len(), 1);
    }

    #[test]
    fn identical_texts_score_100() {
        assert_eq!(similarity("Hello world", "Hello world"), 100);
        assert_eq!(similarity("  padded ", "padded"), 100);
    }

    #[test]
    fn empty_texts_score_0() {
        assert_eq!(similarity("", ""), 0);
        assert_eq!(similarity("abc", ""), 0);
        assert_eq!(similarity("", "abc"), 0);
        assert_eq!(similarity("   ", "abc"), 0);
    }

    #[test]
    fn disjoint_texts_score_0() {
        assert_eq!(similarity("abc", "xyz"), 0);
    }

    #[test]
    fn transposition_costs_extractions() {
        // "hello w" + "ld" + "o" + "r": everything extracted, 3 penalties
        assert_eq!(similarity("hello world", "hello wrold"), 94);
    }

    #[test]
    fn partial_overlap() {
        // "hello " extracted, "e" and "r" extracted, 3 of 11 left
        let score = similarity("hello world", "hello there");
        assert!(score < 70, "score was {}", score);
        assert!(score > 0);
    }

    #[test]
    fn symmetric() {
        let pairs = [
            ("hello world", "hello wrold"),
            ("abcd", "dcba"),
            ("the cat sat", "a cat sat down"),
            ("same size1", "size same2"),
        ];
        for (a, b) in pairs {
            assert_eq!(similarity(a, b), similarity(b, a), "{} / {}", a, b);
        }
    }

    #[test]
    fn case_matters() {
        assert!(similarity("HELLO", "hello") < 100);
    }
}
