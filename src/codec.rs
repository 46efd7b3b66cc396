//! Run storage formats.

use std::io;
use std::io::prelude::*;

use crate::{Record, SortError};

/// Run storage format. Provides methods for writing sorted records to a run file and reading them back.
pub trait RunCodec: 'static {
    /// Run file extension.
    const EXTENSION: &'static str;

    /// Dumps records to a run writer.
    fn dump<W: Write>(writer: &mut W, records: &[Record]) -> Result<(), SortError>;

    /// Loads the next record from a run reader. Returns [`None`] once the reader is exhausted.
    ///
    /// `scratch` is a reusable buffer owned by the caller.
    fn load<R: BufRead>(reader: &mut R, scratch: &mut Vec<u8>) -> Option<Result<Record, SortError>>;
}

/// Text run format: one signed decimal integer per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl RunCodec for TextCodec {
    const EXTENSION: &'static str = "txt";

    fn dump<W: Write>(writer: &mut W, records: &[Record]) -> Result<(), SortError> {
        for record in records {
            writeln!(writer, "{}", record)?;
        }

        return Ok(());
    }

    fn load<R: BufRead>(reader: &mut R, scratch: &mut Vec<u8>) -> Option<Result<Record, SortError>> {
        loop {
            scratch.clear();
            match reader.read_until(b'\n', scratch) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => return Some(Err(SortError::IO(err))),
            }

            let line = match std::str::from_utf8(scratch) {
                Ok(line) => line.trim(),
                Err(err) => return Some(Err(SortError::Decode(format!("run line is not UTF-8: {}", err)))),
            };
            if line.is_empty() {
                continue;
            }

            return Some(
                line.parse::<Record>()
                    .map_err(|err| SortError::Decode(format!("run line {:?}: {}", line, err))),
            );
        }
    }
}

/// RMP (Rust MessagePack) run format.
/// Records are stored as MessagePack integers, which keeps small values compact.
/// For more information see https://msgpack.org/.
#[derive(Debug, Clone, Copy, Default)]
pub struct RmpCodec;

impl RunCodec for RmpCodec {
    const EXTENSION: &'static str = "rmp";

    fn dump<W: Write>(writer: &mut W, records: &[Record]) -> Result<(), SortError> {
        for record in records {
            rmp_serde::encode::write(writer, record)
                .map_err(|err| SortError::IO(io::Error::new(io::ErrorKind::Other, err.to_string())))?;
        }

        return Ok(());
    }

    fn load<R: BufRead>(reader: &mut R, _scratch: &mut Vec<u8>) -> Option<Result<Record, SortError>> {
        let exhausted = match reader.fill_buf() {
            Ok(buf) => buf.is_empty(),
            Err(err) => return Some(Err(SortError::IO(err))),
        };
        if exhausted {
            return None;
        }

        Some(rmp_serde::decode::from_read(reader).map_err(|err| SortError::Decode(err.to_string())))
    }
}

#[cfg(test)]
mod test {
    use std::io;

    use super::{RmpCodec, RunCodec, TextCodec};
    use crate::{Record, SortError};

    fn load_all<C: RunCodec>(data: &[u8]) -> Result<Vec<Record>, SortError> {
        let mut reader = io::BufReader::new(data);
        let mut scratch = Vec::new();
        let mut result = Vec::new();
        while let Some(record) = C::load(&mut reader, &mut scratch) {
            result.push(record?);
        }
        Ok(result)
    }

    #[test]
    fn test_text_codec() {
        let mut data = Vec::new();
        TextCodec::dump(&mut data, &[-3, 0, 12, 12]).unwrap();

        assert_eq!(String::from_utf8(data.clone()).unwrap(), "-3\n0\n12\n12\n");
        assert_eq!(load_all::<TextCodec>(&data).unwrap(), vec![-3, 0, 12, 12]);
    }

    #[test]
    fn test_text_codec_tolerates_missing_newline() {
        assert_eq!(load_all::<TextCodec>(b"1\n\n2\r\n3").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_text_codec_corrupted() {
        let result = load_all::<TextCodec>(b"1\nx2\n");
        assert!(matches!(result, Err(SortError::Decode(_))));
    }

    #[test]
    fn test_rmp_codec() {
        let records = vec![i64::MIN, -1, 0, 1, 300, i64::MAX];
        let mut data = Vec::new();
        RmpCodec::dump(&mut data, &records).unwrap();

        assert_eq!(load_all::<RmpCodec>(&data).unwrap(), records);
    }

    #[test]
    fn test_rmp_codec_truncated() {
        let mut data = Vec::new();
        RmpCodec::dump(&mut data, &[i64::MAX]).unwrap();
        data.pop();

        assert!(matches!(load_all::<RmpCodec>(&data), Err(SortError::Decode(_))));
    }
}
