use pretty_assertions::assert_eq;

use z8_codec::isa::z8::Z8Decoder;
use z8_codec::{assemble, AsmOptions, Cond, Error, LinearMemory, Op, Operand, Reassembler};

fn listing(base: u16, bytes: &[u8]) -> Vec<String> {
    let mem = LinearMemory::new(base, bytes);
    let last = base + bytes.len() as u16 - 1;
    Reassembler::new(&mem).reassemble(base, last).lines().map(str::to_string).collect()
}

fn source(base: u16, bytes: &[u8], prefix: &str) -> String {
    let mem = LinearMemory::new(base, bytes);
    let last = base + bytes.len() as u16 - 1;
    Reassembler::new(&mem).reassemble_to_source(base, last, prefix).unwrap()
}

#[test]
fn listing_columns() {
    let lines = listing(0x1000, &[0xE6, 0x20, 0x05, 0x8B, 0xFB, 0xFF, 0xC7, 0x12, 0xFB]);
    assert_eq!(
        lines,
        vec![
            "%1000   E6 20 05    LD      %20, #5",
            "%1003   8B FB       JR      %1000",
            "%1005   FF          NOP",
            "%1006   C7 12 FB    LD      R1, -5(R2)",
        ]
    );
}

#[test]
fn unknown_bytes_are_flagged() {
    // %0F is a hole in the opcode map, %D6 is cut short by the end of memory
    let lines = listing(0x2000, &[0x0F, 0xD6, 0x12]);
    assert_eq!(
        lines,
        vec![
            "%2000   0F          .DB     %0F\t;???",
            "%2001   D6          .DB     %D6\t;???",
            "%2002   12          .DB     %12\t;???",
        ]
    );
}

#[test]
fn vector_table_words() {
    let bytes = [0x08, 0x12, 0x08, 0x40, 0x8F];
    let lines = listing(0x0000, &bytes);
    assert_eq!(lines[0], "%0000   08 12       .DW     %0812");
    assert_eq!(lines[1], "%0002   08 40       .DW     %0840");
    // a word cut short by the end of memory decodes as an instruction
    assert_eq!(lines[2], "%0004   8F          DI");

    let mem = LinearMemory::new(0, &bytes);
    let plain = Reassembler::with_decoder(&mem, Z8Decoder::plain());
    assert_eq!(plain.decode(0).op, Op::Insn(z8_codec::Mnemonic::Ld));
}

#[test]
fn source_labels_and_warnings() {
    // JR into the middle of the LD, CALL outside the range, DJNZ to itself
    let bytes = [0x8B, 0x01, 0xE6, 0x20, 0x05, 0x1A, 0xFE, 0xD6, 0x08, 0x15, 0x8D, 0x10, 0x05];
    let text = source(0x1000, &bytes, "M");
    assert_eq!(
        text,
        "\t.ORG\t%1000\n\n\
         \tJR      %1003\t;!!!\n\
         \tLD      %20, #5\n\
         M1:\tDJNZ    R1, M1\n\
         \tCALL    %0815\n\
         \tJP      M1\n"
    );
}

#[test]
fn long_label_prefix_breaks_line() {
    let text = source(0x1000, &[0x8B, 0xFE], "LONGNAME");
    assert!(text.contains("LONGNAME1:\n\tJR      LONGNAME1\n"), "{text}");
}

#[test]
fn label_prefix_must_be_usable() {
    let mem = LinearMemory::new(0x1000, &[0xFF]);
    let r = Reassembler::new(&mem);
    assert_eq!(r.reassemble_to_source(0x1000, 0x1000, "R"), Err(Error::ReservedWord("R1".into())));
    assert_eq!(r.reassemble_to_source(0x1000, 0x1000, "9X"), Err(Error::InvalidLabel("9X".into())));
    assert!(r.reassemble_to_source(0x1000, 0x1000, "LBL").is_ok());
}

#[test]
fn condition_aliases_decode_canonically() {
    for alias in Cond::aliases() {
        let code = Cond::from_name(alias).unwrap().0;
        let src = format!("        ORG     %100\n        JR      {alias},$");
        let r = assemble(&src, None, &AsmOptions::default()).unwrap();
        let bytes = r.bytes.unwrap();
        assert_eq!(bytes[0] >> 4, code, "{alias}");

        let mem = LinearMemory::new(0x100, &bytes);
        let reass = Reassembler::new(&mem);
        let d = reass.decode(0x100);
        assert_eq!(d.operands[0], Operand::Cond(Cond(code)));
        // same text every time
        let (first, _) = reass.reassemble_one(0x100);
        let (again, _) = reass.reassemble_one(0x100);
        assert_eq!(first, again);
        assert!(first.ends_with(&format!("JR      {}, %0100", Cond(code).name())), "{first}");
    }

    let canonical: Vec<_> = ["EQ", "NE", "ULT", "UGE", "Z", "NZ", "C", "NC"]
        .iter()
        .map(|a| Cond::from_name(a).unwrap().name())
        .collect();
    assert_eq!(canonical, vec!["Z", "NZ", "C", "NC", "Z", "NZ", "C", "NC"]);
}

#[test]
fn always_condition_is_omitted() {
    let lines = listing(0x100, &[0x8D, 0x01, 0x00, 0x0D, 0x01, 0x00]);
    assert_eq!(lines[0], "%0100   8D 01 00    JP      %0100");
    assert_eq!(lines[1], "%0103   0D 01 00    JP      F, %0100");
}
