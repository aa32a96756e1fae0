//! End-to-end scenarios driven through the loader and command parser
//! exactly as the `memsim` binary would, rather than by poking
//! `memsim-core` structures directly.

use memsim_cli::command::{parse_commands, CommandKind};
use memsim_cli::loader::load_descriptor;
use memsim_core::addr::VirtualAddress;
use memsim_core::cache::{CacheConfig, CacheHierarchy};
use memsim_core::executor::{Access, Executor};
use memsim_core::tlb::TlbHierarchy;
use std::fs;
use std::path::Path;

const PAGE_SIZE: usize = 4096;

fn page_with_u32_at(offset: usize, value: u32) -> Vec<u8> {
    let mut page = vec![0u8; PAGE_SIZE];
    page[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    page
}

/// Lay out a descriptor whose page table maps vaddr 0x...0abc to physical
/// 0x4abc: PGD[0]=0x1000, PUD@0x1000[0]=0x2000, PMD@0x2000[0]=0x3000,
/// PTE@0x3000[0]=0x4000.
fn identity_mapped_descriptor(dir: &Path) -> std::path::PathBuf {
    fs::write(dir.join("pgd.bin"), page_with_u32_at(0, 0x1000)).unwrap();
    fs::write(dir.join("pud.bin"), page_with_u32_at(0, 0x2000)).unwrap();
    fs::write(dir.join("pmd.bin"), page_with_u32_at(0, 0x3000)).unwrap();
    fs::write(dir.join("pte.bin"), page_with_u32_at(0, 0x4000)).unwrap();

    let mut data_page = vec![0u8; PAGE_SIZE];
    data_page[0xabc..0xabc + 4].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
    fs::write(dir.join("data.bin"), &data_page).unwrap();

    let descriptor = dir.join("image.desc");
    fs::write(
        &descriptor,
        format!(
            "{}\npgd.bin\n4\n0x1000 pud.bin\n0x2000 pmd.bin\n0x3000 pte.bin\n0x4000 data.bin\n",
            PAGE_SIZE * 6
        ),
    )
    .unwrap();
    descriptor
}

fn default_executor() -> Executor {
    let l1 = CacheConfig { sets: 8, ways: 2, words_per_line: 4 };
    let l2 = CacheConfig { sets: 32, ways: 4, words_per_line: 4 };
    Executor::new(TlbHierarchy::new(4, 16), CacheHierarchy::new(l1, l2))
}

#[test]
fn translate_via_descriptor_loaded_image() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = identity_mapped_descriptor(dir.path());
    let mem = load_descriptor(&descriptor).unwrap();

    let vaddr = VirtualAddress::from_u64(0x0abc).unwrap();
    let paddr = memsim_core::pagewalk::walk(&mem, vaddr).unwrap();
    assert_eq!(paddr.as_u32(), 0x4abc);
}

#[test]
fn cold_read_then_repeat_hit() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = identity_mapped_descriptor(dir.path());
    let mut mem = load_descriptor(&descriptor).unwrap();
    let mut exec = default_executor();
    let vaddr = VirtualAddress::from_u64(0x0abc).unwrap();

    let cold = exec.execute(&mut mem, Access::Read { vaddr, data_size: 4 }).unwrap();
    assert_eq!(cold.read_value, Some(0xDEAD_BEEF));
    assert!(!cold.tlb_hit);
    assert!(!cold.cache_hit);

    let warm = exec.execute(&mut mem, Access::Read { vaddr, data_size: 4 }).unwrap();
    assert_eq!(warm.read_value, Some(0xDEAD_BEEF));
    assert!(warm.tlb_hit);
    assert!(warm.cache_hit);
}

#[test]
fn write_through_is_visible_to_memory_and_cache() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = identity_mapped_descriptor(dir.path());
    let mut mem = load_descriptor(&descriptor).unwrap();
    let mut exec = default_executor();
    let vaddr = VirtualAddress::from_u64(0x0abc).unwrap();

    exec.execute(&mut mem, Access::Read { vaddr, data_size: 4 }).unwrap();
    exec.execute(&mut mem, Access::Write { vaddr, data_size: 4, value: 0xCAFE_BABE }).unwrap();

    assert_eq!(mem.read_word(0x4abc).unwrap(), 0xCAFE_BABE);
    let after = exec.execute(&mut mem, Access::Read { vaddr, data_size: 4 }).unwrap();
    assert_eq!(after.read_value, Some(0xCAFE_BABE));
    assert!(after.cache_hit);
}

#[test]
fn instruction_then_data_access_enforces_tlb_inclusion() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = identity_mapped_descriptor(dir.path());
    let mut mem = load_descriptor(&descriptor).unwrap();
    let mut exec = default_executor();
    let vaddr = VirtualAddress::from_u64(0x0abc).unwrap();

    exec.execute(&mut mem, Access::Instruction { vaddr, data_size: 4 }).unwrap();
    let data_access = exec.execute(&mut mem, Access::Read { vaddr, data_size: 4 }).unwrap();
    assert!(!data_access.tlb_hit, "L1-I's translation must not satisfy the first L1-D access");
}

#[test]
fn byte_round_trip_preserves_neighboring_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = identity_mapped_descriptor(dir.path());
    let mut mem = load_descriptor(&descriptor).unwrap();
    let mut exec = default_executor();
    let vaddr = VirtualAddress::from_u64(0x0abd).unwrap(); // second byte of the DEADBEEF word

    exec.execute(&mut mem, Access::Write { vaddr, data_size: 1, value: 0x42 }).unwrap();
    let read_back = exec.execute(&mut mem, Access::Read { vaddr, data_size: 1 }).unwrap();
    assert_eq!(read_back.read_value, Some(0x42));

    let word = mem.read_word(0x4abc).unwrap();
    assert_eq!(word & 0xFFFF_00FF, 0xDEAD_00EF, "bytes other than the written one must be unchanged");
}

#[test]
fn command_file_round_trips_through_the_executor() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = identity_mapped_descriptor(dir.path());
    let mut mem = load_descriptor(&descriptor).unwrap();
    let mut exec = default_executor();

    let commands_path = dir.path().join("commands.txt");
    fs::write(&commands_path, "R DW @abc\nW DW CAFEBABE @abc\nR DW @abc\n").unwrap();
    let commands = parse_commands(&commands_path).unwrap();
    assert_eq!(commands.len(), 3);

    let mut last_value = None;
    for command in &commands {
        let access = match command.kind {
            CommandKind::ReadInstruction { vaddr } => Access::Instruction { vaddr: VirtualAddress::from_u64(vaddr).unwrap(), data_size: 4 },
            CommandKind::ReadData { vaddr, size } => Access::Read { vaddr: VirtualAddress::from_u64(vaddr).unwrap(), data_size: size },
            CommandKind::WriteData { vaddr, size, value } => {
                Access::Write { vaddr: VirtualAddress::from_u64(vaddr).unwrap(), data_size: size, value }
            }
        };
        let outcome = exec.execute(&mut mem, access).unwrap();
        last_value = outcome.read_value;
    }
    assert_eq!(last_value, Some(0xCAFE_BABE));
}
