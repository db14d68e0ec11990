//! DDM code points.

// Request commands
pub const EXCSAT: u16 = 0x1041;
pub const ACCSEC: u16 = 0x106D;
pub const SECCHK: u16 = 0x106E;
pub const ACCRDB: u16 = 0x2001;
pub const CLSQRY: u16 = 0x2004;
pub const EXCSQLIMM: u16 = 0x200A;
pub const EXCSQLSTT: u16 = 0x200B;
pub const PRPSQLSTT: u16 = 0x200D;

// Reply objects
pub const EXCSATRD: u16 = 0x1443;
pub const ACCSECRD: u16 = 0x14AC;
pub const SECCHKRM: u16 = 0x1219;
pub const ACCRDBRM: u16 = 0x2201;
pub const SQLCARD: u16 = 0x2408;
pub const SQLDARD: u16 = 0x2411;
pub const QRYDTA: u16 = 0x241B;

// Parameters
pub const SVRCOD: u16 = 0x1149;
pub const PRDID: u16 = 0x112E;
pub const EXTNAM: u16 = 0x115E;
pub const SRVNAM: u16 = 0x116D;
pub const USRID: u16 = 0x11A0;
pub const PASSWORD: u16 = 0x11A1;
pub const SECMEC: u16 = 0x11A2;
pub const SECCHKCD: u16 = 0x11A4;
pub const SECTKN: u16 = 0x11DC;
pub const MGRLVLLS: u16 = 0x1404;
pub const PKGSN: u16 = 0x210C;
pub const RDBNAM: u16 = 0x2110;
pub const SQLDTA: u16 = 0x2412;
pub const SQLDTARD: u16 = 0x2413;
pub const SQLSTT: u16 = 0x2414;

// Managers listed in MGRLVLLS
pub const AGENT: u16 = 0x1403;
pub const SECMGR: u16 = 0x1440;
pub const CMNTCPIP: u16 = 0x1474;
pub const SQLAM: u16 = 0x2407;
pub const RDB: u16 = 0x240F;

/// SVRCOD at or above this severity is an error.
pub const SVRCOD_ERROR: u16 = 8;

/// Human-readable name for logs and error messages.
pub fn name(code_point: u16) -> &'static str {
    match code_point {
        EXCSAT => "EXCSAT",
        ACCSEC => "ACCSEC",
        SECCHK => "SECCHK",
        ACCRDB => "ACCRDB",
        CLSQRY => "CLSQRY",
        EXCSQLIMM => "EXCSQLIMM",
        EXCSQLSTT => "EXCSQLSTT",
        PRPSQLSTT => "PRPSQLSTT",
        EXCSATRD => "EXCSATRD",
        ACCSECRD => "ACCSECRD",
        SECCHKRM => "SECCHKRM",
        ACCRDBRM => "ACCRDBRM",
        SQLCARD => "SQLCARD",
        SQLDARD => "SQLDARD",
        QRYDTA => "QRYDTA",
        _ => "UNKNOWN",
    }
}

/// Security mechanism codes carried in SECMEC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityMechanism {
    /// User id and plaintext password.
    UserIdPassword,
    /// User id and RSA-encrypted password.
    EncryptedPassword,
    Kerberos,
    /// Token plug-in, used for JWT.
    Plugin,
}

impl SecurityMechanism {
    pub const fn code(self) -> u16 {
        match self {
            Self::UserIdPassword => 0x0003,
            Self::EncryptedPassword => 0x0007,
            Self::Kerberos => 0x000B,
            Self::Plugin => 0x000F,
        }
    }

    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            0x0003 => Some(Self::UserIdPassword),
            0x0007 => Some(Self::EncryptedPassword),
            0x000B => Some(Self::Kerberos),
            0x000F => Some(Self::Plugin),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserIdPassword => "USRIDPWD",
            Self::EncryptedPassword => "USRENCPWD",
            Self::Kerberos => "KERSEC",
            Self::Plugin => "PLGIN",
        }
    }
}

impl std::fmt::Display for SecurityMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
