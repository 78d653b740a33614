use crate::{ManagerLevels, SecurityMechanism};

// docu is written at re-exports of the frontend crate (drdaconnect/lib.rs)
#[derive(Debug, Clone)]
pub struct ConnectionConfiguration {
    security_mechanism: SecurityMechanism,
    query_block_size: i32,
    max_block_extents: i16,
    ccsid_sbc: u16,
    ccsid_dbc: u16,
    ccsid_mbc: u16,
    typdefnam: String,
    manager_levels: ManagerLevels,
    lob_layer_b_streaming: bool,
    max_buffer_size: usize,
    product_id: String,
    external_name: String,
}

impl Default for ConnectionConfiguration {
    fn default() -> Self {
        Self {
            security_mechanism: SecurityMechanism::default(),
            query_block_size: Self::DEFAULT_QUERY_BLOCK_SIZE,
            max_block_extents: Self::DEFAULT_MAX_BLOCK_EXTENTS,
            ccsid_sbc: Self::DEFAULT_CCSID,
            ccsid_dbc: Self::DEFAULT_CCSID,
            ccsid_mbc: Self::DEFAULT_CCSID,
            typdefnam: Self::DEFAULT_TYPDEFNAM.to_string(),
            manager_levels: ManagerLevels::default(),
            lob_layer_b_streaming: true,
            max_buffer_size: Self::DEFAULT_MAX_BUFFER_SIZE,
            product_id: Self::DEFAULT_PRODUCT_ID.to_string(),
            external_name: Self::DEFAULT_EXTERNAL_NAME.to_string(),
        }
    }
}

impl ConnectionConfiguration {
    /// Default value for the size of the query blocks in which the server returns rows.
    pub const DEFAULT_QUERY_BLOCK_SIZE: i32 = 32_767;

    /// Default value for the number of extra query blocks the server may return;
    /// -1 means no limit.
    pub const DEFAULT_MAX_BLOCK_EXTENTS: i16 = -1;

    /// Default CCSID for single-byte, double-byte and mixed-byte character data (UTF-8).
    pub const DEFAULT_CCSID: u16 = 1208;

    /// Default data type definition name, as declared by Derby clients.
    pub const DEFAULT_TYPDEFNAM: &'static str = "QTDSQLASC";

    /// Minimal buffer size.
    ///
    /// Each session maintains its own re-use buffer into which each outgoing request is serialized.
    pub const MIN_BUFFER_SIZE: usize = 32 * 1_024_usize;

    /// Default value for the maximum buffer size.
    ///
    /// A large request will enforce a corresponding enlargement of the session's buffer.
    /// Oversized buffers are not kept for the whole lifetime of the session,
    /// but shrunk after use to the configured maximum buffer size.
    pub const DEFAULT_MAX_BUFFER_SIZE: usize = 8 * Self::MIN_BUFFER_SIZE;

    /// Default product id, sent with ACCRDB and in the product data.
    pub const DEFAULT_PRODUCT_ID: &'static str = "DNC10110";

    /// Default external name of the client, sent with EXCSAT.
    pub const DEFAULT_EXTERNAL_NAME: &'static str = "drdaconnect";

    /// Returns the security mechanism used to authenticate.
    pub fn security_mechanism(&self) -> SecurityMechanism {
        self.security_mechanism
    }
    /// Sets the security mechanism used to authenticate.
    pub fn set_security_mechanism(&mut self, security_mechanism: SecurityMechanism) {
        self.security_mechanism = security_mechanism;
    }
    /// Builder-method for setting the security mechanism used to authenticate.
    #[must_use]
    pub fn with_security_mechanism(mut self, security_mechanism: SecurityMechanism) -> Self {
        self.security_mechanism = security_mechanism;
        self
    }

    /// Returns the query block size.
    pub fn query_block_size(&self) -> i32 {
        self.query_block_size
    }
    /// Sets the query block size.
    pub fn set_query_block_size(&mut self, query_block_size: i32) {
        self.query_block_size = query_block_size;
    }
    /// Builder-method for setting the query block size.
    #[must_use]
    pub fn with_query_block_size(mut self, query_block_size: i32) -> Self {
        self.query_block_size = query_block_size;
        self
    }

    /// Returns the maximum number of extra query blocks.
    pub fn max_block_extents(&self) -> i16 {
        self.max_block_extents
    }
    /// Sets the maximum number of extra query blocks.
    pub fn set_max_block_extents(&mut self, max_block_extents: i16) {
        self.max_block_extents = max_block_extents;
    }
    /// Builder-method for setting the maximum number of extra query blocks.
    #[must_use]
    pub fn with_max_block_extents(mut self, max_block_extents: i16) -> Self {
        self.max_block_extents = max_block_extents;
        self
    }

    /// Returns the CCSIDs for single-byte, double-byte and mixed-byte character data.
    pub fn ccsids(&self) -> (u16, u16, u16) {
        (self.ccsid_sbc, self.ccsid_dbc, self.ccsid_mbc)
    }
    /// Sets the CCSIDs for single-byte, double-byte and mixed-byte character data.
    pub fn set_ccsids(&mut self, sbc: u16, dbc: u16, mbc: u16) {
        self.ccsid_sbc = sbc;
        self.ccsid_dbc = dbc;
        self.ccsid_mbc = mbc;
    }
    /// Builder-method for setting the CCSIDs.
    #[must_use]
    pub fn with_ccsids(mut self, sbc: u16, dbc: u16, mbc: u16) -> Self {
        self.set_ccsids(sbc, dbc, mbc);
        self
    }

    /// Returns the data type definition name.
    pub fn typdefnam(&self) -> &str {
        &self.typdefnam
    }
    /// Sets the data type definition name.
    pub fn set_typdefnam<S: Into<String>>(&mut self, typdefnam: S) {
        self.typdefnam = typdefnam.into();
    }
    /// Builder-method for setting the data type definition name.
    #[must_use]
    pub fn with_typdefnam<S: Into<String>>(mut self, typdefnam: S) -> Self {
        self.typdefnam = typdefnam.into();
        self
    }

    /// Returns the manager level ceilings that are sent with EXCSAT.
    pub fn manager_levels(&self) -> &ManagerLevels {
        &self.manager_levels
    }
    /// Sets the manager level ceilings.
    pub fn set_manager_levels(&mut self, manager_levels: ManagerLevels) {
        self.manager_levels = manager_levels;
    }
    /// Builder-method for setting the manager level ceilings.
    #[must_use]
    pub fn with_manager_levels(mut self, manager_levels: ManagerLevels) -> Self {
        self.manager_levels = manager_levels;
        self
    }

    /// Returns whether LOB parameters of unknown length are streamed (layer B streaming).
    ///
    /// If switched off, such values are read completely before they are sent.
    pub fn is_lob_layer_b_streaming(&self) -> bool {
        self.lob_layer_b_streaming
    }
    /// Defines whether LOB parameters of unknown length are streamed.
    pub fn set_lob_layer_b_streaming(&mut self, streaming: bool) {
        self.lob_layer_b_streaming = streaming;
    }
    /// Builder-method for defining whether LOB parameters of unknown length are streamed.
    #[must_use]
    pub fn with_lob_layer_b_streaming(mut self, streaming: bool) -> Self {
        self.lob_layer_b_streaming = streaming;
        self
    }

    /// Returns the session's max buffer size.
    ///
    /// See also [`ConnectionConfiguration::MIN_BUFFER_SIZE`] and
    /// [`ConnectionConfiguration::DEFAULT_MAX_BUFFER_SIZE`].
    pub fn max_buffer_size(&self) -> usize {
        self.max_buffer_size
    }
    /// Sets the session's max buffer size; values below twice the minimum are raised.
    pub fn set_max_buffer_size(&mut self, max_buffer_size: usize) {
        self.max_buffer_size = std::cmp::max(max_buffer_size, 2 * Self::MIN_BUFFER_SIZE);
    }
    /// Builder-method for setting the session's max buffer size.
    #[must_use]
    pub fn with_max_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.set_max_buffer_size(max_buffer_size);
        self
    }

    /// Returns the product id.
    pub fn product_id(&self) -> &str {
        &self.product_id
    }
    /// Builder-method for setting the product id, which must have 8 characters.
    #[must_use]
    pub fn with_product_id<S: Into<String>>(mut self, product_id: S) -> Self {
        self.product_id = product_id.into();
        self
    }

    /// Returns the external name of the client.
    pub fn external_name(&self) -> &str {
        &self.external_name
    }
    /// Builder-method for setting the external name of the client.
    #[must_use]
    pub fn with_external_name<S: Into<String>>(mut self, external_name: S) -> Self {
        self.external_name = external_name.into();
        self
    }
}

#[cfg(test)]
mod test {
    use super::ConnectionConfiguration;
    use crate::SecurityMechanism;

    #[test]
    fn test_defaults_and_builder() {
        let config = ConnectionConfiguration::default();
        assert_eq!(config.security_mechanism(), SecurityMechanism::UserIdPassword);
        assert_eq!(config.query_block_size(), 32_767);
        assert_eq!(config.max_block_extents(), -1);
        assert_eq!(config.ccsids(), (1208, 1208, 1208));
        assert_eq!(config.typdefnam(), "QTDSQLASC");
        assert!(config.is_lob_layer_b_streaming());

        let config = config
            .with_security_mechanism(SecurityMechanism::PasswordSubstitute)
            .with_max_buffer_size(10)
            .with_lob_layer_b_streaming(false);
        assert_eq!(
            config.security_mechanism(),
            SecurityMechanism::PasswordSubstitute
        );
        assert_eq!(
            config.max_buffer_size(),
            2 * ConnectionConfiguration::MIN_BUFFER_SIZE
        );
        assert!(!config.is_lob_layer_b_streaming());
    }
}
