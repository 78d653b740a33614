use crate::{
    protocol::codepoint::{AGENT, CMNTCPIP, RDB, SECMGR, SQLAM, SYNCPTMGR, UNICODEMGR, XAMGR},
    DrdaError, DrdaResult,
};

// Lowest levels the protocol engine can work with; optional managers may also be
// refused with level 0.
const FLOORS: [(u16, u16, bool); 7] = [
    (AGENT, 3, false),
    (CMNTCPIP, 5, false),
    (RDB, 3, false),
    (SECMGR, 5, false),
    (SQLAM, 4, false),
    (XAMGR, 7, true),
    (SYNCPTMGR, 5, true),
];

/// The levels of the DDM managers, one small integer per protocol subsystem.
///
/// A client declares its ceilings with EXCSAT; the server answers with the levels it
/// supports, which can only be equal or lower.
/// All protocol decisions of an open session depend on the negotiated levels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagerLevels {
    agent: u16,
    cmntcpip: u16,
    rdb: u16,
    secmgr: u16,
    sqlam: u16,
    xamgr: u16,
    syncptmgr: u16,
    unicodemgr: u16,
}

impl Default for ManagerLevels {
    fn default() -> Self {
        Self {
            agent: 7,
            cmntcpip: 5,
            rdb: 7,
            secmgr: 7,
            sqlam: 7,
            xamgr: 7,
            syncptmgr: 0,
            unicodemgr: Self::UTF8_CCSID,
        }
    }
}

impl ManagerLevels {
    /// The value of the Unicode manager, which is a CCSID rather than a level.
    pub const UTF8_CCSID: u16 = 1208;

    /// Level of the agent.
    pub fn agent(&self) -> u16 {
        self.agent
    }
    /// Level of TCP/IP communications.
    pub fn cmntcpip(&self) -> u16 {
        self.cmntcpip
    }
    /// Level of the relational database manager.
    pub fn rdb(&self) -> u16 {
        self.rdb
    }
    /// Level of the security manager.
    pub fn secmgr(&self) -> u16 {
        self.secmgr
    }
    /// Level of the SQL application manager, which decides among others
    /// whether extended diagnostics are returned.
    pub fn sqlam(&self) -> u16 {
        self.sqlam
    }
    /// Level of the XA manager; 0 if not supported.
    pub fn xamgr(&self) -> u16 {
        self.xamgr
    }
    /// Level of the sync point manager; 0 if not used.
    pub fn syncptmgr(&self) -> u16 {
        self.syncptmgr
    }
    /// CCSID of the Unicode manager; 0 if not supported.
    pub fn unicodemgr(&self) -> u16 {
        self.unicodemgr
    }

    /// Builder-method for setting the ceiling of the SQL application manager.
    #[must_use]
    pub fn with_sqlam(mut self, level: u16) -> Self {
        self.sqlam = level;
        self
    }
    /// Builder-method for setting the ceiling of the relational database manager.
    #[must_use]
    pub fn with_rdb(mut self, level: u16) -> Self {
        self.rdb = level;
        self
    }
    /// Builder-method for setting the ceiling of the security manager.
    #[must_use]
    pub fn with_secmgr(mut self, level: u16) -> Self {
        self.secmgr = level;
        self
    }
    /// Builder-method for setting the ceiling of the XA manager.
    #[must_use]
    pub fn with_xamgr(mut self, level: u16) -> Self {
        self.xamgr = level;
        self
    }

    /// The (manager, level) pairs for EXCSAT; managers with level 0 are not announced.
    pub(crate) fn to_mgrlvlls(&self) -> Vec<(u16, u16)> {
        self.entries()
            .into_iter()
            .filter(|(_, level)| *level != 0)
            .collect()
    }

    fn entries(&self) -> [(u16, u16); 8] {
        [
            (AGENT, self.agent),
            (SECMGR, self.secmgr),
            (CMNTCPIP, self.cmntcpip),
            (RDB, self.rdb),
            (SQLAM, self.sqlam),
            (XAMGR, self.xamgr),
            (SYNCPTMGR, self.syncptmgr),
            (UNICODEMGR, self.unicodemgr),
        ]
    }

    fn slot(&mut self, manager: u16) -> Option<&mut u16> {
        match manager {
            AGENT => Some(&mut self.agent),
            CMNTCPIP => Some(&mut self.cmntcpip),
            RDB => Some(&mut self.rdb),
            SECMGR => Some(&mut self.secmgr),
            SQLAM => Some(&mut self.sqlam),
            XAMGR => Some(&mut self.xamgr),
            SYNCPTMGR => Some(&mut self.syncptmgr),
            UNICODEMGR => Some(&mut self.unicodemgr),
            _ => None,
        }
    }

    /// Applies the levels the server returned in EXCSATRD to these ceilings.
    ///
    /// A level above the ceiling, below the floor, or for a manager that was not requested
    /// is a conflict. Managers the server does not mention keep their ceiling.
    pub(crate) fn negotiate(&self, returned: &[(u16, u16)]) -> DrdaResult<Self> {
        let mut negotiated = self.clone();
        for &(manager, level) in returned {
            let conflict = DrdaError::ManagerLevelConflict { manager, level };
            let slot = negotiated.slot(manager).ok_or_else(|| {
                debug!("server returned unrequested manager 0x{manager:04X}");
                DrdaError::ManagerLevelConflict { manager, level }
            })?;
            let ceiling = *slot;
            if manager == UNICODEMGR {
                if level != 0 && level != ceiling {
                    return Err(conflict);
                }
            } else {
                if level > ceiling {
                    return Err(conflict);
                }
                if let Some(&(_, floor, optional)) = FLOORS.iter().find(|(m, _, _)| *m == manager)
                {
                    if level < floor && !(optional && level == 0) {
                        return Err(conflict);
                    }
                }
            }
            *slot = level.min(ceiling);
        }
        debug!("negotiated manager levels: {negotiated:?}");
        Ok(negotiated)
    }
}
