//! A minimal ELF64 executable writer producing a single `PT_LOAD`
//! segment: no section headers, no dynamic linker, no libc — the file
//! *is* the loaded image, entered directly by the kernel.
//!
//! Reference: <https://www.muppetlabs.com/~breadbox/software/tiny/tiny-elf64.asm.txt>
//!
//! To check the output by hand:
//! `objdump -b binary -M intel,x86-64 -m i386 --adjust-vma=0x1000 --start-address=0x1080 -D ELF_FILE`

use slc_codegen::Assembler;
use slc_ir::{FuncRef, Program};

/// The virtual address the single segment is mapped at. Low enough to
/// fit in a 32-bit immediate, high enough to leave the zero page and
/// common `mmap` hint addresses alone.
const VADDR: u64 = 0x1000;

/// Size of the anonymous data stack `code_entry` `mmap`s before calling
/// `main`: 8 MiB.
const DATA_STACK_SIZE: i32 = 0x800000;

/// `mmap`'s guard-page padding so `mprotect` can carve a zero-width
/// red zone at the unmapped end of the stack region.
const GUARD_PAGE: i32 = 4096;

struct Field {
    size: usize,
    offset: usize,
}

/// Tracks placeholder field positions the way the reference assembler's
/// `fields` dict does, so headers can be written before their contents
/// (like `e_entry`, which depends on the total header size) are known.
#[derive(Default)]
struct Fields(std::collections::HashMap<&'static str, Field>);

impl Fields {
    fn f16(&mut self, asm: &mut Assembler, name: &'static str) {
        self.0.insert(name, Field { size: 2, offset: asm.offset() });
        asm.raw(&[0, 0]);
    }
    fn f32(&mut self, asm: &mut Assembler, name: &'static str) {
        self.0.insert(name, Field { size: 4, offset: asm.offset() });
        asm.raw(&[0, 0, 0, 0]);
    }
    fn f64(&mut self, asm: &mut Assembler, name: &'static str) {
        self.0.insert(name, Field { size: 8, offset: asm.offset() });
        asm.raw(&[0; 8]);
    }
    fn set(&self, asm: &mut Assembler, name: &'static str, value: u64) {
        let field = &self.0[name];
        let bytes = value.to_le_bytes();
        asm.buf[field.offset..field.offset + field.size].copy_from_slice(&bytes[..field.size]);
    }
}

fn elf_header(asm: &mut Assembler, fields: &mut Fields) {
    asm.raw(&[0x7f, 0x45, 0x4c, 0x46, 0x02, 0x01, 0x01, 0x00]); // e_ident
    asm.raw(&[0; 8]);
    asm.raw(&[0x02, 0x00, 0x3e, 0x00, 0x01, 0x00, 0x00, 0x00]); // e_type=EXEC, e_machine=x86-64, e_version=1
    fields.f64(asm, "e_entry");
    fields.f64(asm, "e_phoff");
    fields.f64(asm, "e_shoff");
    fields.f32(asm, "e_flags");
    fields.f16(asm, "e_ehsize");
    fields.f16(asm, "e_phentsize");
    fields.f16(asm, "e_phnum");
    fields.f16(asm, "e_shentsize");
    fields.f16(asm, "e_shnum");
    fields.f16(asm, "e_shstrndx");
    fields.set(asm, "e_phoff", asm.offset() as u64);
    fields.set(asm, "e_ehsize", asm.offset() as u64);
}

fn program_header(asm: &mut Assembler, fields: &mut Fields) {
    asm.raw(&[0x01, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00]); // p_type=LOAD, p_flags=R|X
    asm.i64(0); // p_offset: the whole file, from byte 0
    asm.i64(VADDR as i64);
    asm.i64(VADDR as i64); // p_paddr, unused on this target
    fields.f64(asm, "p_filesz");
    fields.f64(asm, "p_memsz");
    asm.i64(0x1000); // p_align
}

fn elf_begin(asm: &mut Assembler, fields: &mut Fields, alignment: usize) {
    elf_header(asm, fields);
    let phdr_start = asm.offset();
    program_header(asm, fields);
    fields.set(asm, "e_phentsize", (asm.offset() - phdr_start) as u64);
    fields.set(asm, "e_phnum", 1);
    asm.pad_to(alignment);
    fields.set(asm, "e_entry", VADDR + asm.offset() as u64);
}

/// `mmap` an anonymous read-write data stack into `rbx`, then
/// `mprotect` a guard page at its low end. Mirrors the syscall ABI the
/// rest of the generated code relies on (`rbx` never moves again).
fn create_stack(asm: &mut Assembler, size: i32) {
    asm.raw(&[0xb8, 0x09, 0x00, 0x00, 0x00]); // mov eax, 9 (mmap)
    asm.raw(&[0xbf, 0x00, 0x10, 0x00, 0x00]); // mov edi, 0x1000 (addr hint)
    asm.raw(&[0x48, 0xc7, 0xc6]); // mov rsi, imm32 (len)
    asm.i32(size + GUARD_PAGE);
    asm.raw(&[0xba, 0x03, 0x00, 0x00, 0x00]); // mov edx, 3 (PROT_READ|PROT_WRITE)
    asm.raw(&[0x41, 0xba, 0x22, 0x00, 0x00, 0x00]); // mov r10d, 0x22 (MAP_PRIVATE|MAP_ANONYMOUS)
    asm.raw(&[0x49, 0x83, 0xc8, 0xff]); // or r8, -1 (fd = -1)
    asm.raw(&[0x4d, 0x31, 0xc9]); // xor r9, r9 (offset = 0)
    asm.raw(&[0x0f, 0x05]); // syscall
    asm.raw(&[0x48, 0x89, 0xc3]); // mov rbx, rax

    asm.raw(&[0xb8, 0x0a, 0x00, 0x00, 0x00]); // mov eax, 10 (mprotect)
    asm.raw(&[0x48, 0x8d, 0xbb]); // lea rdi, [rbx + size]
    asm.i32(size);
    asm.raw(&[0xbe, 0x00, 0x10, 0x00, 0x00]); // mov esi, 0x1000
    asm.raw(&[0x31, 0xd2]); // xor edx, edx (PROT_NONE)
    asm.raw(&[0x0f, 0x05]); // syscall
}

fn code_entry(asm: &mut Assembler) {
    create_stack(asm, DATA_STACK_SIZE);
    asm.call_func(FuncRef::new(0), 0, 1, 1);
    asm.raw(&[0xb8, 0x3c, 0x00, 0x00, 0x00]); // mov eax, 60 (exit)
    asm.raw(&[0x48, 0x8b, 0x3b]); // mov rdi, [rbx]
    asm.raw(&[0x0f, 0x05]); // syscall
}

/// Build a standalone ELF64 executable image for `program`. `alignment ==
/// 0` means no padding at all, same as `Assembler::pad_to`.
pub fn write_elf(program: &Program, alignment: usize) -> Vec<u8> {
    let mut asm = Assembler::new();
    let mut fields = Fields::default();

    elf_begin(&mut asm, &mut fields, alignment);
    code_entry(&mut asm);
    // Function bodies and the string pool are appended directly into
    // `asm.buf`, unlike `slc_codegen::compile_into`'s draining form:
    // the trailing `p_filesz`/`p_memsz` patch needs the final length of
    // this exact buffer.
    let funcs: Vec<_> = program.funcs.values().collect();
    slc_codegen::emit_functions(&mut asm, &funcs, alignment);
    asm.pad_to(alignment);
    let mut strings = Vec::new();
    asm.finish(&mut strings);
    asm.buf.extend_from_slice(&strings);

    fields.set(&mut asm, "p_filesz", asm.buf.len() as u64);
    fields.set(&mut asm, "p_memsz", asm.buf.len() as u64);
    log::debug!(
        "elf image: {} bytes, data stack {DATA_STACK_SIZE:#x} + {GUARD_PAGE:#x} guard page",
        asm.buf.len()
    );
    asm.buf
}
