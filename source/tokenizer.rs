/// Extracts tokens from `s`: maximal runs of Unicode letters and digits, in input order. All
/// other characters are separators; empty runs are never emitted.
///
/// When `max_length` is `Some`, tokens whose code-point length exceeds it are silently dropped
/// (not truncated). The tokenizer never normalizes case and never fails: malformed input simply
/// contributes no tokens where it doesn't form a letter/digit run.
///
/// ```
/// assert_eq!(triage::tokenize("Hello, world", None), vec!["Hello", "world"]);
/// assert_eq!(
///   triage::tokenize("в займ, рекомендуем", None),
///   vec!["в", "займ", "рекомендуем"]
/// );
/// assert_eq!(
///   triage::tokenize("в займ, рекомендуем", Some(5)),
///   vec!["в", "займ"]
/// );
/// ```
pub fn tokenize(s: &str, max_length: Option<usize>) -> Vec<&str> {
  let mut tokens = Vec::new();
  let mut run: Option<(usize, usize)> = None; // (start byte offset, code-point count)
  let mut run_end = 0;
  for (offset, char) in s.char_indices() {
    if char.is_alphabetic() || char.is_numeric() {
      let (_, count) = run.get_or_insert((offset, 0));
      *count += 1;
      run_end = offset + char.len_utf8();
    } else if let Some((start, count)) = run.take() {
      push(&mut tokens, s, start, run_end, count, max_length);
    }
  }
  if let Some((start, count)) = run.take() {
    push(&mut tokens, s, start, run_end, count, max_length);
  }
  tokens
}

fn push<'a>(
  tokens: &mut Vec<&'a str>,
  s: &'a str,
  start: usize,
  end: usize,
  length: usize,
  max_length: Option<usize>,
) {
  if max_length.map_or(true, |max| length <= max) {
    tokens.push(&s[start..end]);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ascii() {
    assert_eq!(tokenize("Hello, world", None), vec!["Hello", "world"]);
  }

  #[test]
  fn unicode_letters() {
    assert_eq!(
      tokenize("в займ, рекомендуем", None),
      vec!["в", "займ", "рекомендуем"]
    );
  }

  #[test]
  fn max_length_drops_overlong_tokens() {
    assert_eq!(
      tokenize("в займ, рекомендуем", Some(5)),
      vec!["в", "займ"]
    );
  }

  #[test]
  fn digits_and_mixed_runs() {
    assert_eq!(tokenize("buy viagra4u now!!", None), vec!["buy", "viagra4u", "now"]);
  }

  #[test]
  fn empty_and_all_separators() {
    assert!(tokenize("", None).is_empty());
    assert!(tokenize("   ---...,,,", None).is_empty());
  }

  #[test]
  fn malformed_like_input_is_just_separators() {
    // No invalid UTF-8 can reach a &str, but punctuation/control characters behave the same way:
    // they never start a run.
    assert_eq!(tokenize("\u{0}\u{1}hi\u{7f}", None), vec!["hi"]);
  }

  #[test]
  fn token_at_string_boundaries() {
    assert_eq!(tokenize("abc", None), vec!["abc"]);
    assert_eq!(tokenize("a!b", None), vec!["a", "b"]);
  }
}
