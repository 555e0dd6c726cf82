//! Static classification of JVM bytecodes.
//!
//! Pure lookup data consulted during HIR construction:
//! - [`name`] gives the human-readable mnemonic for diagnostics and
//!   fails softly with a sentinel instead of an error
//! - [`can_trap`] says whether executing an opcode can raise a runtime
//!   fault (bounds, null, division, resolution, cast, monitor,
//!   allocation, dispatch) and therefore needs may-throw metadata
//!
//! Values above [`BREAKPOINT`] are the [`ILLEGAL`]/[`END`] sentinels used
//! by the decoder; they are never classified.

pub const NOP: u16 = 0;
pub const ACONST_NULL: u16 = 1;
pub const ICONST_M1: u16 = 2;
pub const ICONST_0: u16 = 3;
pub const ICONST_1: u16 = 4;
pub const ICONST_2: u16 = 5;
pub const ICONST_3: u16 = 6;
pub const ICONST_4: u16 = 7;
pub const ICONST_5: u16 = 8;
pub const LCONST_0: u16 = 9;
pub const LCONST_1: u16 = 10;
pub const FCONST_0: u16 = 11;
pub const FCONST_1: u16 = 12;
pub const FCONST_2: u16 = 13;
pub const DCONST_0: u16 = 14;
pub const DCONST_1: u16 = 15;
pub const BIPUSH: u16 = 16;
pub const SIPUSH: u16 = 17;
pub const LDC: u16 = 18;
pub const LDC_W: u16 = 19;
pub const LDC2_W: u16 = 20;
pub const ILOAD: u16 = 21;
pub const LLOAD: u16 = 22;
pub const FLOAD: u16 = 23;
pub const DLOAD: u16 = 24;
pub const ALOAD: u16 = 25;
pub const ILOAD_0: u16 = 26;
pub const ILOAD_1: u16 = 27;
pub const ILOAD_2: u16 = 28;
pub const ILOAD_3: u16 = 29;
pub const LLOAD_0: u16 = 30;
pub const LLOAD_1: u16 = 31;
pub const LLOAD_2: u16 = 32;
pub const LLOAD_3: u16 = 33;
pub const FLOAD_0: u16 = 34;
pub const FLOAD_1: u16 = 35;
pub const FLOAD_2: u16 = 36;
pub const FLOAD_3: u16 = 37;
pub const DLOAD_0: u16 = 38;
pub const DLOAD_1: u16 = 39;
pub const DLOAD_2: u16 = 40;
pub const DLOAD_3: u16 = 41;
pub const ALOAD_0: u16 = 42;
pub const ALOAD_1: u16 = 43;
pub const ALOAD_2: u16 = 44;
pub const ALOAD_3: u16 = 45;
pub const IALOAD: u16 = 46;
pub const LALOAD: u16 = 47;
pub const FALOAD: u16 = 48;
pub const DALOAD: u16 = 49;
pub const AALOAD: u16 = 50;
pub const BALOAD: u16 = 51;
pub const CALOAD: u16 = 52;
pub const SALOAD: u16 = 53;
pub const ISTORE: u16 = 54;
pub const LSTORE: u16 = 55;
pub const FSTORE: u16 = 56;
pub const DSTORE: u16 = 57;
pub const ASTORE: u16 = 58;
pub const ISTORE_0: u16 = 59;
pub const ISTORE_1: u16 = 60;
pub const ISTORE_2: u16 = 61;
pub const ISTORE_3: u16 = 62;
pub const LSTORE_0: u16 = 63;
pub const LSTORE_1: u16 = 64;
pub const LSTORE_2: u16 = 65;
pub const LSTORE_3: u16 = 66;
pub const FSTORE_0: u16 = 67;
pub const FSTORE_1: u16 = 68;
pub const FSTORE_2: u16 = 69;
pub const FSTORE_3: u16 = 70;
pub const DSTORE_0: u16 = 71;
pub const DSTORE_1: u16 = 72;
pub const DSTORE_2: u16 = 73;
pub const DSTORE_3: u16 = 74;
pub const ASTORE_0: u16 = 75;
pub const ASTORE_1: u16 = 76;
pub const ASTORE_2: u16 = 77;
pub const ASTORE_3: u16 = 78;
pub const IASTORE: u16 = 79;
pub const LASTORE: u16 = 80;
pub const FASTORE: u16 = 81;
pub const DASTORE: u16 = 82;
pub const AASTORE: u16 = 83;
pub const BASTORE: u16 = 84;
pub const CASTORE: u16 = 85;
pub const SASTORE: u16 = 86;
pub const POP: u16 = 87;
pub const POP2: u16 = 88;
pub const DUP: u16 = 89;
pub const DUP_X1: u16 = 90;
pub const DUP_X2: u16 = 91;
pub const DUP2: u16 = 92;
pub const DUP2_X1: u16 = 93;
pub const DUP2_X2: u16 = 94;
pub const SWAP: u16 = 95;
pub const IADD: u16 = 96;
pub const LADD: u16 = 97;
pub const FADD: u16 = 98;
pub const DADD: u16 = 99;
pub const ISUB: u16 = 100;
pub const LSUB: u16 = 101;
pub const FSUB: u16 = 102;
pub const DSUB: u16 = 103;
pub const IMUL: u16 = 104;
pub const LMUL: u16 = 105;
pub const FMUL: u16 = 106;
pub const DMUL: u16 = 107;
pub const IDIV: u16 = 108;
pub const LDIV: u16 = 109;
pub const FDIV: u16 = 110;
pub const DDIV: u16 = 111;
pub const IREM: u16 = 112;
pub const LREM: u16 = 113;
pub const FREM: u16 = 114;
pub const DREM: u16 = 115;
pub const INEG: u16 = 116;
pub const LNEG: u16 = 117;
pub const FNEG: u16 = 118;
pub const DNEG: u16 = 119;
pub const ISHL: u16 = 120;
pub const LSHL: u16 = 121;
pub const ISHR: u16 = 122;
pub const LSHR: u16 = 123;
pub const IUSHR: u16 = 124;
pub const LUSHR: u16 = 125;
pub const IAND: u16 = 126;
pub const LAND: u16 = 127;
pub const IOR: u16 = 128;
pub const LOR: u16 = 129;
pub const IXOR: u16 = 130;
pub const LXOR: u16 = 131;
pub const IINC: u16 = 132;
pub const I2L: u16 = 133;
pub const I2F: u16 = 134;
pub const I2D: u16 = 135;
pub const L2I: u16 = 136;
pub const L2F: u16 = 137;
pub const L2D: u16 = 138;
pub const F2I: u16 = 139;
pub const F2L: u16 = 140;
pub const F2D: u16 = 141;
pub const D2I: u16 = 142;
pub const D2L: u16 = 143;
pub const D2F: u16 = 144;
pub const I2B: u16 = 145;
pub const I2C: u16 = 146;
pub const I2S: u16 = 147;
pub const LCMP: u16 = 148;
pub const FCMPL: u16 = 149;
pub const FCMPG: u16 = 150;
pub const DCMPL: u16 = 151;
pub const DCMPG: u16 = 152;
pub const IFEQ: u16 = 153;
pub const IFNE: u16 = 154;
pub const IFLT: u16 = 155;
pub const IFGE: u16 = 156;
pub const IFGT: u16 = 157;
pub const IFLE: u16 = 158;
pub const IF_ICMPEQ: u16 = 159;
pub const IF_ICMPNE: u16 = 160;
pub const IF_ICMPLT: u16 = 161;
pub const IF_ICMPGE: u16 = 162;
pub const IF_ICMPGT: u16 = 163;
pub const IF_ICMPLE: u16 = 164;
pub const IF_ACMPEQ: u16 = 165;
pub const IF_ACMPNE: u16 = 166;
pub const GOTO: u16 = 167;
pub const JSR: u16 = 168;
pub const RET: u16 = 169;
pub const TABLESWITCH: u16 = 170;
pub const LOOKUPSWITCH: u16 = 171;
pub const IRETURN: u16 = 172;
pub const LRETURN: u16 = 173;
pub const FRETURN: u16 = 174;
pub const DRETURN: u16 = 175;
pub const ARETURN: u16 = 176;
pub const RETURN: u16 = 177;
pub const GETSTATIC: u16 = 178;
pub const PUTSTATIC: u16 = 179;
pub const GETFIELD: u16 = 180;
pub const PUTFIELD: u16 = 181;
pub const INVOKEVIRTUAL: u16 = 182;
pub const INVOKESPECIAL: u16 = 183;
pub const INVOKESTATIC: u16 = 184;
pub const INVOKEINTERFACE: u16 = 185;
pub const INVOKEDYNAMIC: u16 = 186;
pub const NEW: u16 = 187;
pub const NEWARRAY: u16 = 188;
pub const ANEWARRAY: u16 = 189;
pub const ARRAYLENGTH: u16 = 190;
pub const ATHROW: u16 = 191;
pub const CHECKCAST: u16 = 192;
pub const INSTANCEOF: u16 = 193;
pub const MONITORENTER: u16 = 194;
pub const MONITOREXIT: u16 = 195;
pub const WIDE: u16 = 196;
pub const MULTIANEWARRAY: u16 = 197;
pub const IFNULL: u16 = 198;
pub const IFNONNULL: u16 = 199;
pub const GOTO_W: u16 = 200;
pub const JSR_W: u16 = 201;
pub const BREAKPOINT: u16 = 202;

/// Decoder sentinel: undecodable byte.
pub const ILLEGAL: u16 = 255;
/// Decoder sentinel: end of bytecode stream.
pub const END: u16 = 256;

/// Sentinel returned by [`name`] for values outside the opcode table.
pub const NOT_FOUND: &str = "<not found>";

/// Human-readable mnemonic for an opcode, for diagnostics.
///
/// Total over `u16`: unknown values yield [`NOT_FOUND`] rather than an
/// error.
pub fn name(bc: u16) -> &'static str {
    match bc {
        NOP => "nop",
        ACONST_NULL => "aconst_null",
        ICONST_M1 => "iconst_m1",
        ICONST_0 => "iconst_0",
        ICONST_1 => "iconst_1",
        ICONST_2 => "iconst_2",
        ICONST_3 => "iconst_3",
        ICONST_4 => "iconst_4",
        ICONST_5 => "iconst_5",
        LCONST_0 => "lconst_0",
        LCONST_1 => "lconst_1",
        FCONST_0 => "fconst_0",
        FCONST_1 => "fconst_1",
        FCONST_2 => "fconst_2",
        DCONST_0 => "dconst_0",
        DCONST_1 => "dconst_1",
        BIPUSH => "bipush",
        SIPUSH => "sipush",
        LDC => "ldc",
        LDC_W => "ldc_w",
        LDC2_W => "ldc2_w",
        ILOAD => "iload",
        LLOAD => "lload",
        FLOAD => "fload",
        DLOAD => "dload",
        ALOAD => "aload",
        ILOAD_0 => "iload_0",
        ILOAD_1 => "iload_1",
        ILOAD_2 => "iload_2",
        ILOAD_3 => "iload_3",
        LLOAD_0 => "lload_0",
        LLOAD_1 => "lload_1",
        LLOAD_2 => "lload_2",
        LLOAD_3 => "lload_3",
        FLOAD_0 => "fload_0",
        FLOAD_1 => "fload_1",
        FLOAD_2 => "fload_2",
        FLOAD_3 => "fload_3",
        DLOAD_0 => "dload_0",
        DLOAD_1 => "dload_1",
        DLOAD_2 => "dload_2",
        DLOAD_3 => "dload_3",
        ALOAD_0 => "aload_0",
        ALOAD_1 => "aload_1",
        ALOAD_2 => "aload_2",
        ALOAD_3 => "aload_3",
        IALOAD => "iaload",
        LALOAD => "laload",
        FALOAD => "faload",
        DALOAD => "daload",
        AALOAD => "aaload",
        BALOAD => "baload",
        CALOAD => "caload",
        SALOAD => "saload",
        ISTORE => "istore",
        LSTORE => "lstore",
        FSTORE => "fstore",
        DSTORE => "dstore",
        ASTORE => "astore",
        ISTORE_0 => "istore_0",
        ISTORE_1 => "istore_1",
        ISTORE_2 => "istore_2",
        ISTORE_3 => "istore_3",
        LSTORE_0 => "lstore_0",
        LSTORE_1 => "lstore_1",
        LSTORE_2 => "lstore_2",
        LSTORE_3 => "lstore_3",
        FSTORE_0 => "fstore_0",
        FSTORE_1 => "fstore_1",
        FSTORE_2 => "fstore_2",
        FSTORE_3 => "fstore_3",
        DSTORE_0 => "dstore_0",
        DSTORE_1 => "dstore_1",
        DSTORE_2 => "dstore_2",
        DSTORE_3 => "dstore_3",
        ASTORE_0 => "astore_0",
        ASTORE_1 => "astore_1",
        ASTORE_2 => "astore_2",
        ASTORE_3 => "astore_3",
        IASTORE => "iastore",
        LASTORE => "lastore",
        FASTORE => "fastore",
        DASTORE => "dastore",
        AASTORE => "aastore",
        BASTORE => "bastore",
        CASTORE => "castore",
        SASTORE => "sastore",
        POP => "pop",
        POP2 => "pop2",
        DUP => "dup",
        DUP_X1 => "dup_x1",
        DUP_X2 => "dup_x2",
        DUP2 => "dup2",
        DUP2_X1 => "dup2_x1",
        DUP2_X2 => "dup2_x2",
        SWAP => "swap",
        IADD => "iadd",
        LADD => "ladd",
        FADD => "fadd",
        DADD => "dadd",
        ISUB => "isub",
        LSUB => "lsub",
        FSUB => "fsub",
        DSUB => "dsub",
        IMUL => "imul",
        LMUL => "lmul",
        FMUL => "fmul",
        DMUL => "dmul",
        IDIV => "idiv",
        LDIV => "ldiv",
        FDIV => "fdiv",
        DDIV => "ddiv",
        IREM => "irem",
        LREM => "lrem",
        FREM => "frem",
        DREM => "drem",
        INEG => "ineg",
        LNEG => "lneg",
        FNEG => "fneg",
        DNEG => "dneg",
        ISHL => "ishl",
        LSHL => "lshl",
        ISHR => "ishr",
        LSHR => "lshr",
        IUSHR => "iushr",
        LUSHR => "lushr",
        IAND => "iand",
        LAND => "land",
        IOR => "ior",
        LOR => "lor",
        IXOR => "ixor",
        LXOR => "lxor",
        IINC => "iinc",
        I2L => "i2l",
        I2F => "i2f",
        I2D => "i2d",
        L2I => "l2i",
        L2F => "l2f",
        L2D => "l2d",
        F2I => "f2i",
        F2L => "f2l",
        F2D => "f2d",
        D2I => "d2i",
        D2L => "d2l",
        D2F => "d2f",
        I2B => "i2b",
        I2C => "i2c",
        I2S => "i2s",
        LCMP => "lcmp",
        FCMPL => "fcmpl",
        FCMPG => "fcmpg",
        DCMPL => "dcmpl",
        DCMPG => "dcmpg",
        IFEQ => "ifeq",
        IFNE => "ifne",
        IFLT => "iflt",
        IFGE => "ifge",
        IFGT => "ifgt",
        IFLE => "ifle",
        IF_ICMPEQ => "if_icmpeq",
        IF_ICMPNE => "if_icmpne",
        IF_ICMPLT => "if_icmplt",
        IF_ICMPGE => "if_icmpge",
        IF_ICMPGT => "if_icmpgt",
        IF_ICMPLE => "if_icmple",
        IF_ACMPEQ => "if_acmpeq",
        IF_ACMPNE => "if_acmpne",
        GOTO => "goto",
        JSR => "jsr",
        RET => "ret",
        TABLESWITCH => "tableswitch",
        LOOKUPSWITCH => "lookupswitch",
        IRETURN => "ireturn",
        LRETURN => "lreturn",
        FRETURN => "freturn",
        DRETURN => "dreturn",
        ARETURN => "areturn",
        RETURN => "return",
        GETSTATIC => "getstatic",
        PUTSTATIC => "putstatic",
        GETFIELD => "getfield",
        PUTFIELD => "putfield",
        INVOKEVIRTUAL => "invokevirtual",
        INVOKESPECIAL => "invokespecial",
        INVOKESTATIC => "invokestatic",
        INVOKEINTERFACE => "invokeinterface",
        INVOKEDYNAMIC => "invokedynamic",
        NEW => "new",
        NEWARRAY => "newarray",
        ANEWARRAY => "anewarray",
        ARRAYLENGTH => "arraylength",
        ATHROW => "athrow",
        CHECKCAST => "checkcast",
        INSTANCEOF => "instanceof",
        MONITORENTER => "monitorenter",
        MONITOREXIT => "monitorexit",
        WIDE => "wide",
        MULTIANEWARRAY => "multianewarray",
        IFNULL => "ifnull",
        IFNONNULL => "ifnonnull",
        GOTO_W => "goto_w",
        JSR_W => "jsr_w",
        BREAKPOINT => "breakpoint",
        _ => NOT_FOUND,
    }
}

/// Whether executing an opcode can raise a runtime fault.
///
/// Consulted by the HIR builder to decide whether a node needs may-throw
/// metadata and an exception edge. Pure predicate, no state.
pub fn can_trap(bc: u16) -> bool {
    matches!(
        bc,
        LDC | LDC_W
            | LDC2_W
            | IALOAD
            | LALOAD
            | FALOAD
            | DALOAD
            | AALOAD
            | BALOAD
            | CALOAD
            | SALOAD
            | IASTORE
            | LASTORE
            | FASTORE
            | DASTORE
            | AASTORE
            | BASTORE
            | CASTORE
            | SASTORE
            | IDIV
            | LDIV
            | IREM
            | LREM
            | GETSTATIC
            | PUTSTATIC
            | GETFIELD
            | PUTFIELD
            | INVOKEVIRTUAL
            | INVOKESPECIAL
            | INVOKESTATIC
            | INVOKEDYNAMIC
            | INVOKEINTERFACE
            | NEW
            | NEWARRAY
            | ANEWARRAY
            | ARRAYLENGTH
            | ATHROW
            | CHECKCAST
            | INSTANCEOF
            | MONITORENTER
            | MULTIANEWARRAY
    )
}
