//! Resolves a parsed [`super::directives::DataDirective`] to its final
//! bytes. Called once the data section's base address is known, after the
//! code section has been sized.

use std::fs;

use crate::assembler::directives::{DataDirective, DataKind};
use crate::assembler::Error;

/// Produce the bytes a single data directive contributes to the data
/// section, in source order.
pub fn resolve(directive: &DataDirective) -> Result<Vec<u8>, Error> {
    match &directive.kind {
        DataKind::String(bytes) => Ok(bytes.clone()),
        DataKind::Buffer(n) => Ok(vec![0u8; *n as usize]),
        DataKind::File(path) => fs::read(path).map_err(|_| Error::FileIoError {
            path: path.clone(),
            line_number: directive.line_number,
        }),
        DataKind::Raw(value) => Ok(value.to_le_bytes().to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_and_buffer_and_raw_resolve() {
        let string = DataDirective {
            label: "msg".to_string(),
            kind: DataKind::String(vec![b'h', b'i', 0x00]),
            line_number: 1,
        };
        assert_eq!(resolve(&string).unwrap(), vec![b'h', b'i', 0x00]);

        let buffer = DataDirective {
            label: "buf".to_string(),
            kind: DataKind::Buffer(4),
            line_number: 1,
        };
        assert_eq!(resolve(&buffer).unwrap(), vec![0, 0, 0, 0]);

        let raw = DataDirective {
            label: "x".to_string(),
            kind: DataKind::Raw(0x0102),
            line_number: 1,
        };
        assert_eq!(resolve(&raw).unwrap(), vec![0x02, 0x01, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn missing_file_errors() {
        let file = DataDirective {
            label: "blob".to_string(),
            kind: DataKind::File("/no/such/path/jasm-data-test".to_string()),
            line_number: 3,
        };
        assert!(matches!(resolve(&file), Err(Error::FileIoError { .. })));
    }
}
