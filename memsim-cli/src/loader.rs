//! # Memory Image Loader
//!
//! Two ways to materialize the simulator's [`PhysicalMemory`]: a raw dump
//! (the whole file is the image) and a descriptor file (total size, a
//! page-table dump, `K` physical-address page loads, then virtual-address
//! page loads resolved by page-walking against whatever has already been
//! loaded). File paths inside a descriptor are resolved relative to the
//! descriptor's own directory.

use crate::error::{CliError, CliResult};
use memsim_core::addr::VirtualAddress;
use memsim_core::memory::PhysicalMemory;
use memsim_core::pagewalk::walk;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::SplitWhitespace;

const PAGE_SIZE: usize = 4096;

fn read_file(path: &Path) -> CliResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| CliError::Io { path: path.to_path_buf(), source })
}

fn resolve(descriptor_path: &Path, file: &str) -> PathBuf {
    let candidate = PathBuf::from(file);
    if candidate.is_absolute() {
        return candidate;
    }
    descriptor_path.parent().map_or_else(|| candidate.clone(), |dir| dir.join(&candidate))
}

fn load_page(mem: &mut PhysicalMemory, base: u32, page_path: &Path) -> CliResult<()> {
    let bytes = read_file(page_path)?;
    if bytes.len() != PAGE_SIZE {
        return Err(CliError::WrongPageSize { path: page_path.to_path_buf(), actual: bytes.len() as u64 });
    }
    let base = base as usize;
    mem.as_mut_slice()[base..base + PAGE_SIZE].copy_from_slice(&bytes);
    Ok(())
}

/// Load a whole file as one opaque physical-memory image.
pub fn load_raw(path: &Path) -> CliResult<PhysicalMemory> {
    Ok(PhysicalMemory::from_bytes(read_file(path)?))
}

struct Tokens<'a> {
    path: PathBuf,
    iter: Peekable<SplitWhitespace<'a>>,
}

impl<'a> Tokens<'a> {
    fn fail(&self, reason: impl Into<String>) -> CliError {
        CliError::Parse { path: self.path.clone(), line: 0, reason: reason.into() }
    }

    fn next(&mut self) -> CliResult<&'a str> {
        self.iter.next().ok_or_else(|| self.fail("unexpected end of descriptor file"))
    }

    fn next_usize(&mut self) -> CliResult<usize> {
        let tok = self.next()?;
        tok.parse().map_err(|e| self.fail(format!("expected integer, found `{tok}`: {e}")))
    }

    fn strip_hex_prefix(tok: &str) -> &str {
        tok.strip_prefix("0x").or_else(|| tok.strip_prefix("0X")).unwrap_or(tok)
    }

    fn next_hex_u32(&mut self) -> CliResult<u32> {
        let tok = self.next()?;
        u32::from_str_radix(Self::strip_hex_prefix(tok), 16)
            .map_err(|e| self.fail(format!("expected hex address, found `{tok}`: {e}")))
    }

    fn next_hex_u64(&mut self) -> CliResult<u64> {
        let tok = self.next()?;
        u64::from_str_radix(Self::strip_hex_prefix(tok), 16)
            .map_err(|e| self.fail(format!("expected hex address, found `{tok}`: {e}")))
    }
}

/// Load a memory image from a descriptor file.
pub fn load_descriptor(path: &Path) -> CliResult<PhysicalMemory> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io { path: path.to_path_buf(), source })?;
    let mut tokens = Tokens { path: path.to_path_buf(), iter: text.split_whitespace().peekable() };

    let mem_size = tokens.next_usize()?;
    let mut mem = PhysicalMemory::zeroed(mem_size);

    let page_table_file = tokens.next()?.to_string();
    load_page(&mut mem, 0, &resolve(path, &page_table_file))?;

    let physical_pages = tokens.next_usize()?;
    for _ in 0..physical_pages {
        let phys_addr = tokens.next_hex_u32()?;
        let file = tokens.next()?.to_string();
        load_page(&mut mem, phys_addr, &resolve(path, &file))?;
    }

    while tokens.iter.peek().is_some() {
        let virt_addr = tokens.next_hex_u64()?;
        let file = tokens.next()?.to_string();
        let vaddr = VirtualAddress::from_u64(virt_addr)?;
        let paddr = walk(&mem, vaddr)?;
        load_page(&mut mem, paddr.page_base(), &resolve(path, &file))?;
    }

    Ok(mem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_page(dir: &Path, name: &str, fill: u8) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, vec![fill; PAGE_SIZE]).unwrap();
        path
    }

    #[test]
    fn raw_dump_loads_the_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.bin");
        fs::write(&path, [1u8, 2, 3, 4]).unwrap();
        let mem = load_raw(&path).unwrap();
        assert_eq!(mem.len(), 4);
        assert_eq!(mem.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn descriptor_loads_page_table_and_physical_pages() {
        let dir = tempfile::tempdir().unwrap();
        write_page(dir.path(), "pt.bin", 0);
        write_page(dir.path(), "data.bin", 0x7A);

        let descriptor = dir.path().join("image.desc");
        fs::write(
            &descriptor,
            format!("{}\npt.bin\n1\n0x2000 data.bin\n", PAGE_SIZE * 4),
        )
        .unwrap();

        let mem = load_descriptor(&descriptor).unwrap();
        assert_eq!(mem.len(), PAGE_SIZE * 4);
        assert_eq!(mem.read_byte(0x2000).unwrap(), 0x7A);
    }

    #[test]
    fn wrong_page_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pt.bin"), vec![0u8; 10]).unwrap();
        let descriptor = dir.path().join("image.desc");
        fs::write(&descriptor, format!("{}\npt.bin\n0\n", PAGE_SIZE)).unwrap();
        assert!(load_descriptor(&descriptor).is_err());
    }

    #[test]
    fn virtual_address_pages_walk_against_already_loaded_tables() {
        let dir = tempfile::tempdir().unwrap();
        let mut pgd = vec![0u8; PAGE_SIZE];
        pgd[0..4].copy_from_slice(&0x3000u32.to_le_bytes());
        fs::write(dir.path().join("pt.bin"), &pgd).unwrap();

        let mut pud = vec![0u8; PAGE_SIZE];
        pud[0..4].copy_from_slice(&0x4000u32.to_le_bytes());
        fs::write(dir.path().join("pud.bin"), &pud).unwrap();

        let mut pmd = vec![0u8; PAGE_SIZE];
        pmd[0..4].copy_from_slice(&0x5000u32.to_le_bytes());
        fs::write(dir.path().join("pmd.bin"), &pmd).unwrap();

        let mut pte = vec![0u8; PAGE_SIZE];
        pte[0..4].copy_from_slice(&0x6000u32.to_le_bytes());
        fs::write(dir.path().join("pte.bin"), &pte).unwrap();

        write_page(dir.path(), "leaf.bin", 0x99);

        let descriptor = dir.path().join("image.desc");
        fs::write(
            &descriptor,
            format!(
                "{}\npt.bin\n3\n0x3000 pud.bin\n0x4000 pmd.bin\n0x5000 pte.bin\n0x0 leaf.bin\n",
                PAGE_SIZE * 8
            ),
        )
        .unwrap();

        let mem = load_descriptor(&descriptor).unwrap();
        assert_eq!(mem.read_byte(0x6000).unwrap(), 0x99);
    }
}
