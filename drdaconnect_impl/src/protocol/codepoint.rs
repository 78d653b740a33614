//! DDM codepoints, i.e. the numeric type tags of all commands, reply messages,
//! reply data objects and parameters that are exchanged with the server.
#![allow(dead_code)]

// Commands
pub const EXCSAT: u16 = 0x1041;
pub const ACCSEC: u16 = 0x106D;
pub const SECCHK: u16 = 0x106E;
pub const ACCRDB: u16 = 0x2001;
pub const CLSQRY: u16 = 0x2005;
pub const CNTQRY: u16 = 0x2006;
pub const DSCSQLSTT: u16 = 0x2008;
pub const EXCSQLIMM: u16 = 0x200A;
pub const EXCSQLSTT: u16 = 0x200B;
pub const OPNQRY: u16 = 0x200C;
pub const PRPSQLSTT: u16 = 0x200D;
pub const RDBCMM: u16 = 0x200E;
pub const RDBRLLBCK: u16 = 0x200F;
pub const EXCSQLSET: u16 = 0x2014;

// Reply data objects
pub const EXCSATRD: u16 = 0x1443;
pub const ACCSECRD: u16 = 0x14AC;
pub const SQLCARD: u16 = 0x2408;
pub const SQLDARD: u16 = 0x2411;
pub const SQLDTA: u16 = 0x2412;
pub const SQLDTARD: u16 = 0x2413;
pub const SQLSTT: u16 = 0x2414;
pub const QRYDSC: u16 = 0x241A;
pub const QRYDTA: u16 = 0x241B;
pub const SQLATTR: u16 = 0x2450;
pub const SQLRSLRD: u16 = 0x240E;
pub const SQLCINRD: u16 = 0x240B;
pub const FDODSC: u16 = 0x0010;
pub const FDODTA: u16 = 0x147A;
pub const EXTDTA: u16 = 0x146C;
pub const TYPDEFNAM: u16 = 0x002F;
pub const TYPDEFOVR: u16 = 0x0035;

// Reply messages
pub const MGRLVLRM: u16 = 0x1210;
pub const SECCHKRM: u16 = 0x1219;
pub const CMDNSPRM: u16 = 0x1250;
pub const PRCCNVRM: u16 = 0x1245;
pub const SYNTAXRM: u16 = 0x124C;
pub const VALNSPRM: u16 = 0x1252;
pub const OBJNSPRM: u16 = 0x1253;
pub const CMDCHKRM: u16 = 0x1254;
pub const ACCRDBRM: u16 = 0x2201;
pub const QRYNOPRM: u16 = 0x2202;
pub const RDBNACRM: u16 = 0x2204;
pub const OPNQRYRM: u16 = 0x2205;
pub const RDBACCRM: u16 = 0x2207;
pub const ENDQRYRM: u16 = 0x220B;
pub const ENDUOWRM: u16 = 0x220C;
pub const QRYPOPRM: u16 = 0x220F;
pub const RDBNFNRM: u16 = 0x2211;
pub const OPNQFLRM: u16 = 0x2212;
pub const SQLERRRM: u16 = 0x2213;
pub const RDBUPDRM: u16 = 0x2218;
pub const RSLSETRM: u16 = 0x2219;
pub const RDBAFLRM: u16 = 0x221A;
pub const RDBATHRM: u16 = 0x22CB;
pub const ABNUOWRM: u16 = 0x220D;
pub const DTAMCHRM: u16 = 0x220E;

// Parameters
pub const CODPNT: u16 = 0x000C;
pub const PRDID: u16 = 0x112E;
pub const PRCCNVCD: u16 = 0x113F;
pub const SRVCLSNM: u16 = 0x1147;
pub const SVRCOD: u16 = 0x1149;
pub const SYNERRCD: u16 = 0x114A;
pub const SRVDGN: u16 = 0x1153;
pub const SRVRLSLV: u16 = 0x115A;
pub const SPVNAM: u16 = 0x115D;
pub const EXTNAM: u16 = 0x115E;
pub const SRVNAM: u16 = 0x116D;
pub const SECMGRNM: u16 = 0x1196;
pub const CCSIDSBC: u16 = 0x119C;
pub const CCSIDDBC: u16 = 0x119D;
pub const CCSIDMBC: u16 = 0x119E;
pub const USRID: u16 = 0x11A0;
pub const PASSWORD: u16 = 0x11A1;
pub const SECMEC: u16 = 0x11A2;
pub const SECCHKCD: u16 = 0x11A4;
pub const SECTKN: u16 = 0x11DC;
pub const NEWPASSWORD: u16 = 0x11DE;
pub const MGRLVLLS: u16 = 0x1404;
pub const RDBINTTKN: u16 = 0x2103;
pub const PRDDTA: u16 = 0x2104;
pub const RDBCMTOK: u16 = 0x2105;
pub const RDBACCCL: u16 = 0x210F;
pub const RDBNAM: u16 = 0x2110;
pub const OUTEXP: u16 = 0x2111;
pub const PKGNAMCSN: u16 = 0x2113;
pub const QRYBLKSZ: u16 = 0x2114;
pub const UOWDSP: u16 = 0x2115;
pub const RTNSQLDA: u16 = 0x2116;
pub const RDBALWUPD: u16 = 0x211A;
pub const SQLCSRHLD: u16 = 0x211F;
pub const PKGDFTCST: u16 = 0x2125;
pub const CRRTKN: u16 = 0x2135;
pub const PRCNAM: u16 = 0x2138;
pub const NBRROW: u16 = 0x213A;
pub const MAXRSLCNT: u16 = 0x2140;
pub const MAXBLKEXT: u16 = 0x2141;
pub const RSLSETFLG: u16 = 0x2142;
pub const TYPSQLDA: u16 = 0x2146;
pub const RTNEXTDTA: u16 = 0x2148;
pub const QRYATTSCR: u16 = 0x2149;
pub const QRYATTUPD: u16 = 0x2150;
pub const QRYROWSET: u16 = 0x2156;
pub const QRYATTSNS: u16 = 0x2157;
pub const QRYINSID: u16 = 0x215B;
pub const QRYCLSIMP: u16 = 0x215D;
pub const QRYBLKFCT: u16 = 0x215F;
pub const QRYPRCTYP: u16 = 0x2102;
pub const QRYATTSET: u16 = 0x215A;
pub const PKGSNLST: u16 = 0x2139;
pub const SRVLST: u16 = 0x244E;

// Managers
pub const AGENT: u16 = 0x1403;
pub const SECMGR: u16 = 0x1440;
pub const CMNAPPC: u16 = 0x1444;
pub const CMNTCPIP: u16 = 0x1474;
pub const SYNCPTMGR: u16 = 0x14C0;
pub const RSYNCMGR: u16 = 0x14C1;
pub const XAMGR: u16 = 0x1C01;
pub const UNICODEMGR: u16 = 0x1C08;
pub const SQLAM: u16 = 0x2407;
pub const RDB: u16 = 0x240F;

// Query protocol types
pub const FIXROWPRC: u16 = 0x2418;
pub const LMTBLKPRC: u16 = 0x2417;

// Values of SYNERRCD
pub const SYNERRCD_DSS_LESS_THAN_6: u8 = 0x01;
pub const SYNERRCD_DSS_LENGTH_BYTE_NUMBER_MISMATCH: u8 = 0x02;
pub const SYNERRCD_CBYTE_NOT_D0: u8 = 0x03;
pub const SYNERRCD_FBYTE_NOT_SUPPORTED: u8 = 0x04;
pub const SYNERRCD_DSS_CHAIN_NO_DSS_FOUND: u8 = 0x06;
pub const SYNERRCD_OBJ_LEN_LESS_THAN_4: u8 = 0x07;
pub const SYNERRCD_OBJ_LEN_MISMATCH: u8 = 0x08;
pub const SYNERRCD_OBJ_LEN_NOT_ALLOWED: u8 = 0x0B;
pub const SYNERRCD_INCORRECT_EXTENDED_LEN: u8 = 0x0C;
pub const SYNERRCD_REQ_OBJ_NOT_FOUND: u8 = 0x0E;
pub const SYNERRCD_DUP_OBJ_PRESENT: u8 = 0x12;
pub const SYNERRCD_INVALID_CORRELATOR: u8 = 0x13;
pub const SYNERRCD_REQ_VAL_NOT_FOUND: u8 = 0x14;
pub const SYNERRCD_DSS_CONT_LESS_OR_EQUAL_2: u8 = 0x16;
pub const SYNERRCD_CHAIN_OFF_SAME_NEXT_CORRELATOR: u8 = 0x18;
pub const SYNERRCD_CHAIN_OFF_ERROR_CONTINUE: u8 = 0x1A;

// Values of OUTEXP, RTNSQLDA and TYPSQLDA
pub const TRUE: u8 = 0xF1;
pub const FALSE: u8 = 0xF0;
pub const TYPSQLDA_STD_OUTPUT: u8 = 0;
pub const TYPSQLDA_LIGHT_OUTPUT: u8 = 1;
pub const TYPSQLDA_X_OUTPUT: u8 = 2;
pub const TYPSQLDA_STD_INPUT: u8 = 3;
pub const TYPSQLDA_LIGHT_INPUT: u8 = 4;
pub const TYPSQLDA_X_INPUT: u8 = 5;

// Values of QRYCLSIMP
pub const QRYCLSIMP_SERVER_CHOICE: u8 = 0x00;
pub const QRYCLSIMP_YES: u8 = 0x01;
pub const QRYCLSIMP_NO: u8 = 0x02;

// Values of RTNEXTDTA
pub const RTNEXTROW: u8 = 0x01;
pub const RTNEXTALL: u8 = 0x02;

// Values of RSLSETFLG and MAXRSLCNT
pub const RSLSETFLG_EXTENDED_SQLDA: u8 = 0x01;
pub const MAXRSLCNT_NOLIMIT: i16 = -1;

/// Null indicator of nullable groups and values.
pub const NULLDATA: u8 = 0xFF;

/// Returns a readable name for the codepoint, to be used in logs and error messages.
pub fn name(cp: u16) -> &'static str {
    match cp {
        EXCSAT => "EXCSAT",
        ACCSEC => "ACCSEC",
        SECCHK => "SECCHK",
        ACCRDB => "ACCRDB",
        CLSQRY => "CLSQRY",
        CNTQRY => "CNTQRY",
        DSCSQLSTT => "DSCSQLSTT",
        EXCSQLIMM => "EXCSQLIMM",
        EXCSQLSTT => "EXCSQLSTT",
        OPNQRY => "OPNQRY",
        PRPSQLSTT => "PRPSQLSTT",
        RDBCMM => "RDBCMM",
        RDBRLLBCK => "RDBRLLBCK",
        EXCSQLSET => "EXCSQLSET",
        EXCSATRD => "EXCSATRD",
        ACCSECRD => "ACCSECRD",
        SQLCARD => "SQLCARD",
        SQLDARD => "SQLDARD",
        SQLDTA => "SQLDTA",
        SQLDTARD => "SQLDTARD",
        SQLSTT => "SQLSTT",
        QRYDSC => "QRYDSC",
        QRYDTA => "QRYDTA",
        SQLATTR => "SQLATTR",
        SQLRSLRD => "SQLRSLRD",
        SQLCINRD => "SQLCINRD",
        FDODSC => "FDODSC",
        FDODTA => "FDODTA",
        EXTDTA => "EXTDTA",
        TYPDEFNAM => "TYPDEFNAM",
        TYPDEFOVR => "TYPDEFOVR",
        MGRLVLRM => "MGRLVLRM",
        SECCHKRM => "SECCHKRM",
        CMDNSPRM => "CMDNSPRM",
        PRCCNVRM => "PRCCNVRM",
        SYNTAXRM => "SYNTAXRM",
        VALNSPRM => "VALNSPRM",
        OBJNSPRM => "OBJNSPRM",
        CMDCHKRM => "CMDCHKRM",
        ACCRDBRM => "ACCRDBRM",
        QRYNOPRM => "QRYNOPRM",
        RDBNACRM => "RDBNACRM",
        OPNQRYRM => "OPNQRYRM",
        RDBACCRM => "RDBACCRM",
        ENDQRYRM => "ENDQRYRM",
        ENDUOWRM => "ENDUOWRM",
        QRYPOPRM => "QRYPOPRM",
        RDBNFNRM => "RDBNFNRM",
        OPNQFLRM => "OPNQFLRM",
        SQLERRRM => "SQLERRRM",
        RDBUPDRM => "RDBUPDRM",
        RSLSETRM => "RSLSETRM",
        RDBAFLRM => "RDBAFLRM",
        RDBATHRM => "RDBATHRM",
        ABNUOWRM => "ABNUOWRM",
        DTAMCHRM => "DTAMCHRM",
        CODPNT => "CODPNT",
        PRDID => "PRDID",
        PRCCNVCD => "PRCCNVCD",
        SRVCLSNM => "SRVCLSNM",
        SVRCOD => "SVRCOD",
        SYNERRCD => "SYNERRCD",
        SRVDGN => "SRVDGN",
        SRVRLSLV => "SRVRLSLV",
        SPVNAM => "SPVNAM",
        EXTNAM => "EXTNAM",
        SRVNAM => "SRVNAM",
        SECMGRNM => "SECMGRNM",
        CCSIDSBC => "CCSIDSBC",
        CCSIDDBC => "CCSIDDBC",
        CCSIDMBC => "CCSIDMBC",
        USRID => "USRID",
        PASSWORD => "PASSWORD",
        SECMEC => "SECMEC",
        SECCHKCD => "SECCHKCD",
        SECTKN => "SECTKN",
        NEWPASSWORD => "NEWPASSWORD",
        MGRLVLLS => "MGRLVLLS",
        RDBINTTKN => "RDBINTTKN",
        PRDDTA => "PRDDTA",
        RDBCMTOK => "RDBCMTOK",
        RDBACCCL => "RDBACCCL",
        RDBNAM => "RDBNAM",
        OUTEXP => "OUTEXP",
        PKGNAMCSN => "PKGNAMCSN",
        QRYBLKSZ => "QRYBLKSZ",
        UOWDSP => "UOWDSP",
        RTNSQLDA => "RTNSQLDA",
        RDBALWUPD => "RDBALWUPD",
        SQLCSRHLD => "SQLCSRHLD",
        PKGDFTCST => "PKGDFTCST",
        CRRTKN => "CRRTKN",
        PRCNAM => "PRCNAM",
        NBRROW => "NBRROW",
        MAXRSLCNT => "MAXRSLCNT",
        MAXBLKEXT => "MAXBLKEXT",
        RSLSETFLG => "RSLSETFLG",
        TYPSQLDA => "TYPSQLDA",
        RTNEXTDTA => "RTNEXTDTA",
        QRYATTSCR => "QRYATTSCR",
        QRYATTUPD => "QRYATTUPD",
        QRYROWSET => "QRYROWSET",
        QRYATTSNS => "QRYATTSNS",
        QRYINSID => "QRYINSID",
        QRYCLSIMP => "QRYCLSIMP",
        QRYBLKFCT => "QRYBLKFCT",
        QRYPRCTYP => "QRYPRCTYP",
        QRYATTSET => "QRYATTSET",
        PKGSNLST => "PKGSNLST",
        SRVLST => "SRVLST",
        AGENT => "AGENT",
        SECMGR => "SECMGR",
        CMNAPPC => "CMNAPPC",
        CMNTCPIP => "CMNTCPIP",
        SYNCPTMGR => "SYNCPTMGR",
        RSYNCMGR => "RSYNCMGR",
        XAMGR => "XAMGR",
        UNICODEMGR => "UNICODEMGR",
        SQLAM => "SQLAM",
        RDB => "RDB",
        FIXROWPRC => "FIXROWPRC",
        LMTBLKPRC => "LMTBLKPRC",
        _ => "<unknown>",
    }
}
