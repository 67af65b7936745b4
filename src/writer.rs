//! Serialises assembled code + data bytes into an on-disk executable.
//!
//! Two layouts are supported: a minimal ELF64 executable with a single
//! `PT_LOAD` segment, and a raw headerless binary that is just the payload.
//! Both are write-only — there is no relocation table, symbol table, or
//! section header, since the assembler never needs to read either format
//! back.

use std::fs;

use crate::assembler::{BASE_ADDR, HEADER_SIZE};
use crate::assembler::Error;

const ELF_HEADER_SIZE: u64 = 64;
const PROGRAM_HEADER_SIZE: u64 = 56;

/// Which container format to wrap the assembled bytes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Elf,
    Raw,
}

/// Build the final file contents for `payload` (code bytes followed by
/// data bytes) in the requested format.
pub fn build(payload: &[u8], format: Format) -> Vec<u8> {
    match format {
        Format::Elf => build_elf(payload),
        Format::Raw => payload.to_vec(),
    }
}

fn build_elf(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE as usize + payload.len());
    out.extend_from_slice(&elf_header());
    out.extend_from_slice(&program_header(payload.len() as u64));
    out.extend_from_slice(payload);
    out
}

fn elf_header() -> [u8; 64] {
    let mut header = [0u8; 64];
    header[0..4].copy_from_slice(&[0x7F, 0x45, 0x4C, 0x46]);
    header[4] = 2; // ELFCLASS64
    header[5] = 1; // ELFDATA2LSB
    header[6] = 1; // EV_CURRENT
    header[7] = 0; // ELFOSABI_SYSV
    // header[8..16] ABI version + padding, already zero.

    header[16..18].copy_from_slice(&2u16.to_le_bytes()); // e_type = ET_EXEC
    header[18..20].copy_from_slice(&0x3Eu16.to_le_bytes()); // e_machine = EM_X86_64
    header[20..24].copy_from_slice(&1u32.to_le_bytes()); // e_version
    header[24..32].copy_from_slice(&(BASE_ADDR + HEADER_SIZE).to_le_bytes()); // e_entry
    header[32..40].copy_from_slice(&ELF_HEADER_SIZE.to_le_bytes()); // e_phoff
    header[40..48].copy_from_slice(&0u64.to_le_bytes()); // e_shoff
    header[48..52].copy_from_slice(&0u32.to_le_bytes()); // e_flags
    header[52..54].copy_from_slice(&(ELF_HEADER_SIZE as u16).to_le_bytes()); // e_ehsize
    header[54..56].copy_from_slice(&(PROGRAM_HEADER_SIZE as u16).to_le_bytes()); // e_phentsize
    header[56..58].copy_from_slice(&1u16.to_le_bytes()); // e_phnum
    header[58..60].copy_from_slice(&0u16.to_le_bytes()); // e_shentsize
    header[60..62].copy_from_slice(&0u16.to_le_bytes()); // e_shnum
    header[62..64].copy_from_slice(&0u16.to_le_bytes()); // e_shstrndx
    header
}

fn program_header(payload_size: u64) -> [u8; 56] {
    let file_size = HEADER_SIZE + payload_size;
    let mut header = [0u8; 56];
    header[0..4].copy_from_slice(&1u32.to_le_bytes()); // p_type = PT_LOAD
    header[4..8].copy_from_slice(&7u32.to_le_bytes()); // p_flags = R | W | X
    header[8..16].copy_from_slice(&0u64.to_le_bytes()); // p_offset
    header[16..24].copy_from_slice(&BASE_ADDR.to_le_bytes()); // p_vaddr
    header[24..32].copy_from_slice(&BASE_ADDR.to_le_bytes()); // p_paddr
    header[32..40].copy_from_slice(&file_size.to_le_bytes()); // p_filesz
    header[40..48].copy_from_slice(&file_size.to_le_bytes()); // p_memsz
    header[48..56].copy_from_slice(&0x1000u64.to_le_bytes()); // p_align
    header
}

/// Write `contents` to `path`. Does not set the filesystem executable bit
/// on the result — that is the caller's responsibility.
pub fn write_to_file(path: &str, contents: &[u8]) -> Result<(), Error> {
    fs::write(path, contents).map_err(|_| Error::OutputIoError {
        path: path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elf_header_starts_with_magic_and_class() {
        let bytes = build(&[], Format::Elf);
        assert_eq!(&bytes[0..8], &[0x7F, 0x45, 0x4C, 0x46, 0x02, 0x01, 0x01, 0x00]);
    }

    #[test]
    fn elf_file_size_matches_header_plus_payload() {
        let payload = vec![0x48, 0x00, 0x00];
        let bytes = build(&payload, Format::Elf);
        assert_eq!(bytes.len() as u64, HEADER_SIZE + payload.len() as u64);
    }

    #[test]
    fn entry_point_is_base_plus_header_size() {
        let bytes = build(&[], Format::Elf);
        let entry = u64::from_le_bytes(bytes[24..32].try_into().unwrap());
        assert_eq!(entry, BASE_ADDR + HEADER_SIZE);
    }

    #[test]
    fn program_header_filesz_matches_total() {
        let payload = vec![0u8; 32];
        let bytes = build(&payload, Format::Elf);
        let filesz = u64::from_le_bytes(bytes[64 + 32..64 + 40].try_into().unwrap());
        assert_eq!(filesz, HEADER_SIZE + payload.len() as u64);
    }

    #[test]
    fn raw_format_is_payload_only() {
        let payload = vec![0x48, 0xC7, 0xC0];
        assert_eq!(build(&payload, Format::Raw), payload);
    }

    #[test]
    fn write_to_file_does_not_touch_permissions() {
        let path = std::env::temp_dir().join("jasm-writer-test-output");
        let path = path.to_str().unwrap();
        write_to_file(path, &[0x48, 0x00]).unwrap();
        let mode = fs::metadata(path).unwrap().permissions();
        let contents = fs::read(path).unwrap();
        fs::remove_file(path).ok();
        assert_eq!(contents, vec![0x48, 0x00]);
        // write_to_file must not set any executable bits itself.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            assert_eq!(mode.mode() & 0o111, 0);
        }
    }
}
