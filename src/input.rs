//! Input records tokenizer.

use std::io;
use std::io::prelude::*;

use log;

use crate::{Record, SortError};

/// Longest token that can still be a record: sign followed by 19 digits.
const MAX_TOKEN_LEN: usize = 20;

/// Handling of input tokens that are not signed decimal integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedPolicy {
    /// Fail with [`SortError::MalformedInput`].
    Reject,
    /// Stop reading at the first malformed token. A leading signed integer of that token, if any, is still
    /// emitted as the last record.
    Truncate,
}

impl Default for MalformedPolicy {
    fn default() -> Self {
        MalformedPolicy::Reject
    }
}

/// Reads whitespace delimited signed decimal integers from a buffered reader.
///
/// Tokens may be separated by any ASCII whitespace including newlines. Tokens are scanned directly from the
/// reader buffer, so memory usage does not depend on line length. The iterator is fused: after the end of
/// input, an error or a truncation it keeps returning [`None`].
pub struct RecordReader<R> {
    reader: R,
    policy: MalformedPolicy,
    /// Current token, at most `MAX_TOKEN_LEN + 1` bytes. Longer tokens are cut.
    token: Vec<u8>,
    records_read: u64,
    done: bool,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R, policy: MalformedPolicy) -> Self {
        RecordReader {
            reader,
            policy,
            token: Vec::with_capacity(MAX_TOKEN_LEN + 1),
            records_read: 0,
            done: false,
        }
    }

    /// Number of records successfully read so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Reads the next token into `self.token`. Returns `false` at the end of input.
    fn read_token(&mut self) -> Result<bool, SortError> {
        self.token.clear();
        loop {
            let chunk = match self.reader.fill_buf() {
                Ok(chunk) => chunk,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            if chunk.is_empty() {
                return Ok(!self.token.is_empty());
            }

            let mut consumed = 0;
            let mut complete = false;
            for &byte in chunk {
                consumed += 1;
                if byte.is_ascii_whitespace() {
                    if !self.token.is_empty() {
                        complete = true;
                        break;
                    }
                } else if self.token.len() <= MAX_TOKEN_LEN {
                    self.token.push(byte);
                }
            }

            self.reader.consume(consumed);
            if complete {
                return Ok(true);
            }
        }
    }

    fn token_text(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.token).into_owned();
        if self.token.len() > MAX_TOKEN_LEN {
            text.push_str("...");
        }
        text
    }
}

fn parse_token(token: &[u8]) -> Option<Record> {
    std::str::from_utf8(token).ok()?.parse().ok()
}

/// Parses the longest leading `[+-]digits` part of a token.
fn parse_leading_integer(token: &[u8]) -> Option<Record> {
    let sign = usize::from(matches!(token.first(), Some(b'+') | Some(b'-')));
    let digits = token[sign..].iter().take_while(|byte| byte.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    parse_token(&token[..sign + digits])
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<Record, SortError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_token() {
            Ok(true) => {}
            Ok(false) => {
                self.done = true;
                return None;
            }
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        }

        if let Some(record) = parse_token(&self.token) {
            self.records_read += 1;
            return Some(Ok(record));
        }

        self.done = true;
        match self.policy {
            MalformedPolicy::Truncate => {
                let leading = parse_leading_integer(&self.token);
                if leading.is_some() {
                    self.records_read += 1;
                }
                log::warn!(
                    "input truncated at malformed token {:?} after {} records",
                    self.token_text(),
                    self.records_read
                );
                leading.map(Ok)
            }
            MalformedPolicy::Reject => Some(Err(SortError::MalformedInput {
                token: self.token_text(),
                position: self.records_read,
            })),
        }
    }
}

#[cfg(test)]
mod test {
    use std::io;

    use rstest::*;

    use super::{MalformedPolicy, RecordReader, MAX_TOKEN_LEN};
    use crate::{Record, SortError};

    fn read_all(input: &str, policy: MalformedPolicy) -> Result<Vec<Record>, SortError> {
        RecordReader::new(input.as_bytes(), policy).collect()
    }

    #[rstest]
    #[case("", vec![])]
    #[case("\n\n  \n", vec![])]
    #[case("42", vec![42])]
    #[case("5\n3\n8\n", vec![5, 3, 8])]
    #[case("  -1 +2\t3\r\n\n 4  ", vec![-1, 2, 3, 4])]
    #[case("9223372036854775807\n-9223372036854775808\n", vec![i64::MAX, i64::MIN])]
    fn test_valid_input(#[case] input: &str, #[case] expected: Vec<Record>) {
        assert_eq!(read_all(input, MalformedPolicy::Reject).unwrap(), expected);
    }

    #[test]
    fn test_tokens_split_across_reads() {
        let reader = io::BufReader::with_capacity(3, "12345 -678\n\n  9 10".as_bytes());
        let records: Vec<Record> = RecordReader::new(reader, MalformedPolicy::Reject)
            .map(Result::unwrap)
            .collect();

        assert_eq!(records, vec![12345, -678, 9, 10]);
    }

    #[test]
    fn test_single_line_input_is_read_incrementally() {
        let line: String = (0..200_000).map(|value| format!("{} ", value)).collect();
        let total = line.len() as u64;
        let mut reader = RecordReader::new(
            io::BufReader::with_capacity(4096, io::Cursor::new(line.into_bytes())),
            MalformedPolicy::Reject,
        );

        assert_eq!(reader.next().unwrap().unwrap(), 0);
        assert!(reader.reader.get_ref().position() <= 4096);
        assert!(reader.token.capacity() <= MAX_TOKEN_LEN + 1);

        assert_eq!(reader.by_ref().count(), 199_999);
        assert_eq!(reader.reader.get_ref().position(), total);
        assert!(reader.token.capacity() <= MAX_TOKEN_LEN + 1);
    }

    #[test]
    fn test_reject_malformed() {
        let mut reader = RecordReader::new("1\n2\nabc\n3\n".as_bytes(), MalformedPolicy::Reject);

        assert_eq!(reader.next().unwrap().unwrap(), 1);
        assert_eq!(reader.next().unwrap().unwrap(), 2);
        match reader.next() {
            Some(Err(SortError::MalformedInput { token, position })) => {
                assert_eq!(token, "abc");
                assert_eq!(position, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(reader.next().is_none());
    }

    #[rstest]
    #[case("1 2\n3.5\n4\n", vec![1, 2, 3])]
    #[case("12abc 7", vec![12])]
    #[case("-5x", vec![-5])]
    #[case("1 abc 2", vec![1])]
    #[case("1 - 2", vec![1])]
    #[case("1 99999999999999999999 2", vec![1])]
    fn test_truncate_malformed(#[case] input: &str, #[case] expected: Vec<Record>) {
        let mut reader = RecordReader::new(input.as_bytes(), MalformedPolicy::Truncate);

        let records: Vec<Record> = reader.by_ref().map(Result::unwrap).collect();

        assert_eq!(records, expected);
        assert_eq!(reader.records_read(), expected.len() as u64);
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_out_of_range_is_malformed() {
        let result = read_all("1\n99999999999999999999\n", MalformedPolicy::Reject);
        assert!(matches!(result, Err(SortError::MalformedInput { position: 1, .. })));
    }

    #[test]
    fn test_overlong_token_is_cut() {
        let input = format!("1 {} 2", "7".repeat(10_000));
        let mut reader = RecordReader::new(input.as_bytes(), MalformedPolicy::Reject);

        assert_eq!(reader.next().unwrap().unwrap(), 1);
        match reader.next() {
            Some(Err(SortError::MalformedInput { token, position })) => {
                assert_eq!(token, format!("{}...", "7".repeat(MAX_TOKEN_LEN + 1)));
                assert_eq!(position, 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(reader.token.capacity() <= MAX_TOKEN_LEN + 1);
    }
}
