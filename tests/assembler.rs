use pretty_assertions::assert_eq;

use z8_codec::asm::MAX_ERRORS;
use z8_codec::{assemble, AsmOptions, AssembleResult, EmbedRules, LinearMemory, Reassembler, Severity};

fn asm(src: &str) -> AssembleResult {
    assemble(src, None, &AsmOptions::default()).unwrap()
}

fn asm_cpu(src: &str, cpu: &str) -> AssembleResult {
    assemble(src, Some(cpu), &AsmOptions::default()).unwrap()
}

fn messages(r: &AssembleResult, severity: Severity) -> Vec<String> {
    r.diagnostics
        .iter()
        .filter(|d| d.severity == severity)
        .map(|d| d.message.clone())
        .collect()
}

fn errors(r: &AssembleResult) -> Vec<String> {
    messages(r, Severity::Error)
}

fn warnings(r: &AssembleResult) -> Vec<String> {
    messages(r, Severity::Warning)
}

#[test]
fn error_threshold_aborts() {
    let src = "BOGUS\n".repeat(150);
    let r = asm(&src);
    assert!(r.aborted);
    assert_eq!(r.bytes, None);
    assert_eq!(r.diagnostics.len(), MAX_ERRORS + 1);
    assert!(r.diagnostics[..MAX_ERRORS]
        .iter()
        .all(|d| d.message == "unknown instruction 'BOGUS'" && d.line.is_some()));
    let last = r.diagnostics.last().unwrap();
    assert_eq!(last.message, "too many errors, assembly aborted");
    assert_eq!(last.line, None);
    // the 100th error was on line 100
    assert_eq!(r.diagnostics[MAX_ERRORS - 1].line, Some(100));
}

#[test]
fn print_statement_block() {
    // `1 LET A=5;PRINT A` compiled by hand: store into the variable
    // register, then call the print routine of the interpreter
    let src = "
        ORG     %8000
        ENT
        LD      %20,#5          ; LET A=5
        CALL    PRINT           ; PRINT A
        RET
PRINT   EQU     %0815
";
    let r = asm(src);
    assert!(r.diagnostics.is_empty(), "{:?}", r.diagnostics);
    let bytes = r.bytes.unwrap();
    assert!(!bytes.is_empty());
    assert_eq!(r.entry_addr, Some(0x8000));

    let mem = LinearMemory::new(r.begin_addr.unwrap(), &bytes);
    let reass = Reassembler::new(&mem);
    let (first, next) = reass.reassemble_one(r.entry_addr.unwrap());
    let (second, _) = reass.reassemble_one(next);
    assert_eq!(first, "%8000   E6 20 05    LD      %20, #5");
    assert_eq!(second, "%8003   D6 08 15    CALL    %0815");
}

#[test]
fn missing_extended_registers_warn_once() {
    let r = asm_cpu("        LD      %90,#1", "U883");
    assert_eq!(warnings(&r), vec!["register %90 does not exist on U883"]);
    assert_eq!(r.bytes, Some(vec![0xE6, 0x90, 0x01]));

    // same through the CPU directive
    let r = asm("        .CPU    U883\n        LD      %90,#1");
    assert_eq!(r.warning_count(), 1);
    assert_eq!(r.error_count(), 0);
    assert!(r.bytes.is_some());

    // Z8 has the extended file, and so does a caller who says so
    assert_eq!(asm_cpu("        LD      %90,#1", "Z8").warning_count(), 0);
    let opts = AsmOptions { regs_80_to_ef: true, ..AsmOptions::default() };
    assert_eq!(assemble("        LD      %90,#1", None, &opts).unwrap().warning_count(), 0);
    assert_eq!(
        warnings(&asm("        LD      %90,#1")),
        vec!["register %90 does not exist in all Z8 CPUs"]
    );
}

#[test]
fn cpu_selection() {
    let r = asm_cpu("        NOP", "Z80");
    assert_eq!(errors(&r), vec!["CPU 'Z80' not supported"]);
    assert_eq!(r.bytes, None);

    let r = asm_cpu("        CPU     Z8601\n        NOP", "U883");
    assert_eq!(errors(&r), vec!["CPU already specified"]);

    // option and argument: the argument wins
    let opts = AsmOptions { cpu: Some("Z86E04".into()), ..AsmOptions::default() };
    let r = assemble("        WDT", Some("U883"), &opts).unwrap();
    assert_eq!(r.error_count(), 1);
}

#[test]
fn watchdog_instructions() {
    let r = asm_cpu("        WDT", "U883");
    assert_eq!(errors(&r), vec!["CPU U883 does not support watchdog instructions"]);

    let r = asm_cpu("        WDH\n        WDT", "Z86E04");
    assert!(r.diagnostics.is_empty(), "{:?}", r.diagnostics);
    assert_eq!(r.bytes, Some(vec![0x4F, 0x5F]));

    let r = asm("        WDT");
    assert_eq!(warnings(&r), vec!["watchdog instructions are not supported by all Z8 CPUs"]);
    assert_eq!(r.bytes, Some(vec![0x5F]));
}

#[test]
fn register_warnings() {
    // reading a write-only register
    let r = asm("        LD      R1,P01M");
    assert_eq!(warnings(&r), vec!["register P01M is write-only"]);
    assert_eq!(r.bytes, Some(vec![0x18, 0xF8]));
    assert_eq!(asm("        LD      P01M,#%04").warning_count(), 0);
    assert_eq!(warnings(&asm("        OR      PRE0,#1")), vec!["register PRE0 is write-only"]);

    let r = asm("        LD      %E1,#1");
    assert_eq!(warnings(&r), vec!["%E1 is working register R1"]);

    let r = asm("        INCW    RR3");
    assert_eq!(warnings(&r), vec!["RR3 is not a register pair (odd number)"]);
    assert_eq!(r.bytes, Some(vec![0xA0, 0xE3]));

    let r = asm_cpu("        LD      R0,%01", "Z86C04");
    assert_eq!(warnings(&r), vec!["register %01 is reserved on Z86C04"]);
}

#[test]
fn warning_directives() {
    let r = asm("        WARNING \"check me\"\n        NOP");
    assert_eq!(warnings(&r), vec!["check me"]);
    assert!(r.bytes.is_some());

    let r = asm("        WARNOFF\n        LD      %90,#1\n        WARNON\n        LD      %91,#1");
    assert_eq!(warnings(&r), vec!["register %91 does not exist in all Z8 CPUs"]);

    let r = asm("        ERROR   'not for this board'");
    assert_eq!(errors(&r), vec!["not for this board"]);
    assert_eq!(r.diagnostics[0].line, Some(1));
}

#[test]
fn label_legality() {
    assert_eq!(asm("LOOP:   NOP").error_count(), 0);
    assert_eq!(asm("_x1:    NOP").error_count(), 0);
    for bad in ["R1", "RR4", "R16", "NZ", "ULT", "HIGH", "FLAGS", "SP"] {
        let r = asm(&format!("{bad}:   NOP"));
        assert_eq!(r.error_count(), 1, "{bad}");
        assert_eq!(r.bytes, None);
    }

    let r = asm("TWICE:  NOP\nTWICE:  NOP");
    assert_eq!(errors(&r), vec!["label 'TWICE' already defined"]);
    assert_eq!(r.diagnostics[0].line, Some(2));

    // case-sensitive unless asked otherwise
    assert_eq!(asm("loop:   NOP\nLOOP:   NOP").error_count(), 0);
    let opts = AsmOptions { labels_ignore_case: true, ..AsmOptions::default() };
    assert_eq!(assemble("loop:   NOP\nLOOP:   NOP", None, &opts).unwrap().error_count(), 1);
}

#[test]
fn undefined_labels_are_pass2_errors() {
    let r = asm("        NOP\n        JP      NOWHERE\n        NOP");
    assert_eq!(errors(&r), vec!["label 'NOWHERE' not defined"]);
    assert_eq!(r.diagnostics[0].line, Some(2));
    // the good lines still make it into the line table
    let placed: Vec<_> = r.lines.iter().map(|l| l.line).collect();
    assert_eq!(placed, vec![1, 3]);
    assert_eq!(r.bytes, None);
}

#[test]
fn conditional_on_labels() {
    // only labels defined further up count
    let r = asm("        IF      LATER\n        DB      1\n        ENDIF\nLATER:  NOP");
    assert_eq!(r.bytes, Some(vec![0xFF]));

    let r = asm("X       EQU     LATER\n        IF      X\n        DB      1\n        ENDIF\nLATER:  NOP");
    assert_eq!(r.error_count(), 1);

    let r = asm("        IFDEF   LATER\n        DB      1\n        ENDIF\nLATER:  NOP");
    assert_eq!(r.bytes, Some(vec![0xFF]));

    let r = asm("        IF      1\n        NOP");
    assert_eq!(errors(&r), vec!["IF without ENDIF"]);
    assert_eq!(errors(&asm("        ENDIF")), vec!["ENDIF without IF"]);
}

#[test]
fn predefined_labels_from_options() {
    let opts = AsmOptions::from_json(r#"{"predefined_labels": {"PRINT": 2069}}"#).unwrap();
    let r = assemble("        IFDEF   PRINT\n        CALL    PRINT\n        ENDIF", None, &opts).unwrap();
    assert_eq!(r.bytes, Some(vec![0xD6, 0x08, 0x15]));
    assert_eq!(r.symbols.get("PRINT"), Some(&0x0815));
}

#[test]
fn embedded_code_rules() {
    let embed = |allow_nul_cr| AsmOptions { embed: Some(EmbedRules { allow_nul_cr }), ..AsmOptions::default() };
    let run = |src: &str, opts: &AsmOptions| assemble(src, None, opts).unwrap();

    let r = run("        ORG     %4000\n        DB      1,%3B", &embed(true));
    assert_eq!(errors(&r), vec!["byte %3B at %4001 would end the BASIC statement"]);
    assert_eq!(r.bytes, None);

    let r = run("        DB      0,%0D,1", &embed(false));
    assert_eq!(r.error_count(), 2);
    assert_eq!(run("        DB      0,%0D,1", &embed(true)).error_count(), 0);

    let r = run("        DB      %0D,%80", &embed(true));
    assert_eq!(errors(&r), vec!["byte %0D at %0000 followed by a byte with bit 7 set"]);

    // not checked at all without the option
    assert_eq!(asm("        DB      %3B,0").error_count(), 0);
}

#[test]
fn layout_errors() {
    let r = asm("        ORG     %FFFF\n        DB      1,2");
    assert_eq!(errors(&r), vec!["location counter overflow past %FFFF"]);

    let r = asm("        JR      FAR\n        DS      200\nFAR:    NOP");
    assert_eq!(errors(&r), vec!["relative jump distance too large"]);

    let r = asm("        DB      256");
    assert_eq!(errors(&r), vec!["value %0100 out of 8-bit range"]);

    let r = asm("        ORG     LATER\nLATER:  NOP");
    assert_eq!(errors(&r), vec!["label 'LATER' not defined"]);
}

#[test]
fn directive_prefixes() {
    assert_eq!(asm("        .ORG    %10\n        .DB     1").bytes, Some(vec![1]));
    assert_eq!(asm("        $IF     1\n        DB      1\n        $ENDIF").bytes, Some(vec![1]));
    assert_eq!(errors(&asm("        $ORG    %10")), vec!["unknown instruction '$ORG'"]);

    let r = asm("        .ORIGIN %200\n        NOP");
    assert_eq!((r.begin_addr, r.bytes), (Some(0x200), Some(vec![0xFF])));
}

#[test]
fn title_entry_and_listing_table() {
    let r = asm("        TITLE   'DEMO'\n        ORG     %100\n        NOP\n        ENT\n        RET\n        END\n        BOGUS");
    assert_eq!(r.title.as_deref(), Some("DEMO"));
    assert_eq!(r.entry_addr, Some(0x101));
    assert_eq!(r.begin_addr, Some(0x100));
    assert_eq!(r.bytes, Some(vec![0xFF, 0xAF]));
    let lines: Vec<_> = r.lines.iter().map(|l| (l.line, l.addr, l.len)).collect();
    assert_eq!(lines, vec![(3, 0x100, 1), (5, 0x101, 1)]);
}

#[test]
fn diagnostics_display() {
    let r = asm("        NOP\n        LD      R1");
    assert_eq!(r.diagnostics[0].to_string(), "Error in line 2: instruction does not exist with these operands");
    assert_eq!(r.diagnostics[0].offset, Some(12));
}

#[test]
fn result_serialises() {
    let r = asm("        NOP");
    let json = serde_json::to_value(&r).unwrap();
    assert_eq!(json["bytes"], serde_json::json!([255]));
    assert_eq!(json["aborted"], serde_json::json!(false));
}

#[test]
fn non_ascii_text() {
    let opts = AsmOptions { warn_non_ascii: true, ..AsmOptions::default() };
    let r = assemble("        DB      'äb'", None, &opts).unwrap();
    assert_eq!(warnings(&r), vec!["'ä' is not an ASCII character"]);
    assert_eq!(r.bytes, Some(vec![0xE4, b'b']));
    // silent by default
    assert_eq!(asm("        DB      'äb'").warning_count(), 0);

    let r = asm("        DB      '€x'");
    assert_eq!(errors(&r), vec!["character '€' cannot be represented as a byte"]);
}
