//! Read- and write-side file configurations.
//!
//! The read side (`LazConfig`, `CopcConfig`) owns its header and COPC info
//! by value and only hands out const views. The write side
//! (`LazConfigWriter`, `CopcConfigWriter`) additionally hands out mutable
//! borrows. Converting between the two always deep-clones, so mutations on
//! one side are never visible on the other.

use crate::copc::CopcInfo;
use crate::geometry::Vector3;
use crate::header::{point_base_byte_size, LasHeader};
use crate::vlr::EbVlr;

fn build_header(
    point_format_id: u8,
    scale: Vector3,
    offset: Vector3,
    extra_bytes_vlr: &EbVlr,
) -> crate::Result<LasHeader> {
    let base = point_base_byte_size(point_format_id)
        .ok_or(crate::Error::UnsupportedPointFormat(point_format_id))?;
    Ok(LasHeader::new(
        point_format_id,
        base + extra_bytes_vlr.extra_bytes_len(),
        scale,
        offset,
    ))
}

/// Read-side view of a LAZ file configuration.
#[derive(Clone, Debug)]
pub struct LazConfig {
    pub(crate) header: LasHeader,
    pub(crate) wkt: String,
    pub(crate) eb_vlr: EbVlr,
}

impl LazConfig {
    pub fn new(header: LasHeader, wkt: impl Into<String>, eb_vlr: EbVlr) -> Self {
        LazConfig {
            header,
            wkt: wkt.into(),
            eb_vlr,
        }
    }

    pub fn las_header(&self) -> &LasHeader {
        &self.header
    }

    pub fn wkt(&self) -> &str {
        &self.wkt
    }

    pub fn extra_bytes_vlr(&self) -> &EbVlr {
        &self.eb_vlr
    }
}

/// Write-side LAZ configuration with mutable access to the header.
#[derive(Clone, Debug)]
pub struct LazConfigWriter {
    header: LasHeader,
    wkt: String,
    eb_vlr: EbVlr,
}

impl LazConfigWriter {
    /// A configuration for the given point format with default scale and
    /// offset, no CRS and no extra bytes.
    pub fn new(point_format_id: u8) -> crate::Result<Self> {
        Self::with_options(
            point_format_id,
            Vector3::default_scale(),
            Vector3::default_offset(),
            "",
            EbVlr::default(),
        )
    }

    pub fn with_options(
        point_format_id: u8,
        scale: Vector3,
        offset: Vector3,
        wkt: impl Into<String>,
        eb_vlr: EbVlr,
    ) -> crate::Result<Self> {
        Ok(LazConfigWriter {
            header: build_header(point_format_id, scale, offset, &eb_vlr)?,
            wkt: wkt.into(),
            eb_vlr,
        })
    }

    pub fn las_header(&self) -> &LasHeader {
        &self.header
    }

    pub fn las_header_mut(&mut self) -> &mut LasHeader {
        &mut self.header
    }

    pub fn wkt(&self) -> &str {
        &self.wkt
    }

    pub fn extra_bytes_vlr(&self) -> &EbVlr {
        &self.eb_vlr
    }
}

impl From<&LazConfig> for LazConfigWriter {
    fn from(config: &LazConfig) -> Self {
        LazConfigWriter {
            header: config.header.clone(),
            wkt: config.wkt.clone(),
            eb_vlr: config.eb_vlr.clone(),
        }
    }
}

impl From<&CopcConfig> for LazConfigWriter {
    fn from(config: &CopcConfig) -> Self {
        LazConfigWriter {
            header: config.header.clone(),
            wkt: config.wkt.clone(),
            eb_vlr: config.eb_vlr.clone(),
        }
    }
}

/// Read-side view of a COPC file configuration.
///
/// Storing a header here marks it as a COPC header.
#[derive(Clone, Debug)]
pub struct CopcConfig {
    pub(crate) header: LasHeader,
    pub(crate) wkt: String,
    pub(crate) eb_vlr: EbVlr,
    pub(crate) copc_info: CopcInfo,
}

impl CopcConfig {
    pub fn new(
        mut header: LasHeader,
        copc_info: CopcInfo,
        wkt: impl Into<String>,
        eb_vlr: EbVlr,
    ) -> Self {
        header.is_copc = true;
        CopcConfig {
            header,
            wkt: wkt.into(),
            eb_vlr,
            copc_info,
        }
    }

    pub fn from_laz_config(config: &LazConfig, copc_info: CopcInfo) -> Self {
        Self::new(
            config.header.clone(),
            copc_info,
            config.wkt.clone(),
            config.eb_vlr.clone(),
        )
    }

    pub fn las_header(&self) -> &LasHeader {
        &self.header
    }

    pub fn wkt(&self) -> &str {
        &self.wkt
    }

    pub fn extra_bytes_vlr(&self) -> &EbVlr {
        &self.eb_vlr
    }

    pub fn copc_info(&self) -> &CopcInfo {
        &self.copc_info
    }
}

/// Write-side COPC configuration with mutable access to the header and the
/// COPC info.
#[derive(Clone, Debug)]
pub struct CopcConfigWriter {
    header: LasHeader,
    wkt: String,
    eb_vlr: EbVlr,
    copc_info: CopcInfo,
}

impl CopcConfigWriter {
    /// A configuration for the given point format with default scale and
    /// offset, no CRS and no extra bytes.
    pub fn new(point_format_id: u8) -> crate::Result<Self> {
        Self::with_options(
            point_format_id,
            Vector3::default_scale(),
            Vector3::default_offset(),
            "",
            EbVlr::default(),
        )
    }

    pub fn with_options(
        point_format_id: u8,
        scale: Vector3,
        offset: Vector3,
        wkt: impl Into<String>,
        eb_vlr: EbVlr,
    ) -> crate::Result<Self> {
        let mut header = build_header(point_format_id, scale, offset, &eb_vlr)?;
        header.is_copc = true;
        Ok(CopcConfigWriter {
            header,
            wkt: wkt.into(),
            eb_vlr,
            copc_info: CopcInfo::default(),
        })
    }

    pub fn las_header(&self) -> &LasHeader {
        &self.header
    }

    pub fn las_header_mut(&mut self) -> &mut LasHeader {
        &mut self.header
    }

    pub fn wkt(&self) -> &str {
        &self.wkt
    }

    pub fn extra_bytes_vlr(&self) -> &EbVlr {
        &self.eb_vlr
    }

    pub fn copc_info(&self) -> &CopcInfo {
        &self.copc_info
    }

    pub fn copc_info_mut(&mut self) -> &mut CopcInfo {
        &mut self.copc_info
    }
}

impl From<&CopcConfig> for CopcConfigWriter {
    fn from(config: &CopcConfig) -> Self {
        CopcConfigWriter {
            header: config.header.clone(),
            wkt: config.wkt.clone(),
            eb_vlr: config.eb_vlr.clone(),
            copc_info: config.copc_info.clone(),
        }
    }
}

impl From<&CopcConfigWriter> for CopcConfig {
    fn from(config: &CopcConfigWriter) -> Self {
        CopcConfig::new(
            config.header.clone(),
            config.copc_info.clone(),
            config.wkt.clone(),
            config.eb_vlr.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vlr::EbField;

    fn test_eb_vlr() -> EbVlr {
        let mut eb_vlr = EbVlr::new();
        eb_vlr
            .add_field(EbField {
                data_type: 0,
                options: 4,
                name: "eb1".to_string(),
                ..Default::default()
            })
            .unwrap();
        eb_vlr
    }

    #[test]
    fn copc_config_writer_defaults() {
        let cfg = CopcConfigWriter::new(7).unwrap();
        assert_eq!(cfg.las_header().point_format_id, 7);
        assert_eq!(cfg.las_header().point_record_length, 36);
        assert_eq!(cfg.las_header().scale, Vector3::default_scale());
        assert!(cfg.las_header().is_copc);
        assert_eq!(cfg.copc_info().spacing, 0.0);
        assert!(cfg.wkt().is_empty());
        assert!(cfg.extra_bytes_vlr().items.is_empty());
    }

    #[test]
    fn copc_config_writer_with_options() {
        let scale = Vector3::new(1.0, 1.0, 1.0);
        let offset = Vector3::new(50.0, 50.0, 50.0);
        let cfg = CopcConfigWriter::with_options(7, scale, offset, "test_wkt", test_eb_vlr()).unwrap();
        assert_eq!(cfg.las_header().point_format_id, 7);
        assert_eq!(cfg.las_header().point_record_length, 40);
        assert_eq!(cfg.las_header().scale, scale);
        assert_eq!(cfg.las_header().offset, offset);
        assert!(cfg.las_header().is_copc);
        assert_eq!(cfg.wkt(), "test_wkt");
        assert_eq!(cfg.extra_bytes_vlr().items[0].name, "eb1");
    }

    #[test]
    fn rejects_non_copc_point_formats() {
        assert!(matches!(
            CopcConfigWriter::new(3),
            Err(crate::Error::UnsupportedPointFormat(3))
        ));
    }

    #[test]
    fn copc_config_from_parts() {
        let mut copc_info = CopcInfo::default();
        copc_info.spacing = 12.0;
        let header = LasHeader::new(7, 40, Vector3::new(1.0, 1.0, 1.0), Vector3::default());
        let cfg = CopcConfig::new(header, copc_info, "test_wkt", test_eb_vlr());
        assert_eq!(cfg.las_header().point_format_id, 7);
        assert!(cfg.las_header().is_copc);
        assert_eq!(cfg.copc_info().spacing, 12.0);
        assert_eq!(cfg.wkt(), "test_wkt");
        assert_eq!(cfg.extra_bytes_vlr().items[0].name, "eb1");
    }

    #[test]
    fn copc_config_from_laz_config() {
        let header = LasHeader::new(7, 40, Vector3::new(1.0, 1.0, 1.0), Vector3::default());
        let laz_cfg = LazConfig::new(header, "test_wkt", test_eb_vlr());
        assert!(!laz_cfg.las_header().is_copc);
        assert_eq!(laz_cfg.wkt(), "test_wkt");
        assert_eq!(laz_cfg.extra_bytes_vlr().items.len(), 1);

        let mut copc_info = CopcInfo::default();
        copc_info.spacing = 12.0;
        let cfg = CopcConfig::from_laz_config(&laz_cfg, copc_info);
        assert!(cfg.las_header().is_copc);
        assert_eq!(cfg.copc_info().spacing, 12.0);
        assert_eq!(cfg.wkt(), "test_wkt");
    }

    #[test]
    fn copy_from_config_is_isolated() {
        let mut copc_info = CopcInfo::default();
        copc_info.spacing = 12.0;
        let mut header = LasHeader::new(7, 40, Vector3::new(1.0, 1.0, 1.0), Vector3::default());
        header.min = Vector3::new(-5.0, -6.0, -7.0);
        let original = CopcConfig::new(header, copc_info, "test_wkt", test_eb_vlr());

        let mut copy = CopcConfigWriter::from(&original);
        copy.las_header_mut().min = Vector3::default();
        copy.copc_info_mut().spacing = 1.0;

        // updating the copy must not change the original
        assert_eq!(original.las_header().min, Vector3::new(-5.0, -6.0, -7.0));
        assert_eq!(original.copc_info().spacing, 12.0);
    }

    #[test]
    fn copy_between_writers_is_isolated() {
        let mut original = CopcConfigWriter::new(7).unwrap();
        let copy = CopcConfigWriter::from(&CopcConfig::from(&original));

        original.las_header_mut().min = Vector3::new(-5.0, -6.0, -7.0);
        original.copc_info_mut().spacing = 12.0;

        // updating the original must not change the copy
        assert_eq!(copy.las_header().min, Vector3::default());
        assert_eq!(copy.copc_info().spacing, 0.0);
    }

    #[test]
    fn laz_writer_from_copc_config_is_isolated() {
        let mut copc_info = CopcInfo::default();
        copc_info.spacing = 12.0;
        let header = LasHeader::new(7, 40, Vector3::new(1.0, 1.0, 1.0), Vector3::default());
        let copc_cfg = CopcConfig::new(header, copc_info, "test_wkt", test_eb_vlr());

        let mut cfg = LazConfigWriter::from(&copc_cfg);
        assert_eq!(cfg.las_header().point_format_id, 7);
        assert_eq!(cfg.wkt(), "test_wkt");
        assert_eq!(cfg.extra_bytes_vlr().items[0].name, "eb1");

        let test_min = Vector3::new(3.0, 4.0, 5.0);
        cfg.las_header_mut().min = test_min;
        assert_eq!(copc_cfg.las_header().min, Vector3::default());
        assert_eq!(cfg.las_header().min, test_min);
    }

    #[test]
    fn laz_config_writer_surface() {
        let cfg = LazConfigWriter::new(6).unwrap();
        assert_eq!(cfg.las_header().point_record_length, 30);
        assert!(!cfg.las_header().is_copc);

        let cfg = LazConfigWriter::with_options(
            7,
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(50.0, 50.0, 50.0),
            "test_wkt",
            test_eb_vlr(),
        )
        .unwrap();
        assert_eq!(cfg.wkt(), "test_wkt");
        assert_eq!(cfg.las_header().point_record_length, 40);
    }
}
