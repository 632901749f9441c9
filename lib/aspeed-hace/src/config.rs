// Licensed under the Apache-2.0 license

/// Default size of each DMA region.
pub const DEFAULT_DMA_LEN: usize = 0xa000;

/// HACE generations, as named by their device-tree compatible strings.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HaceVersion {
    Ast2400,
    Ast2500,
    Ast2600,
}

impl HaceVersion {
    pub fn from_compatible(compatible: &str) -> Option<Self> {
        match compatible {
            "aspeed,ast2400-crypto" => Some(HaceVersion::Ast2400),
            "aspeed,ast2500-crypto" => Some(HaceVersion::Ast2500),
            "aspeed,ast2600-crypto" => Some(HaceVersion::Ast2600),
            _ => None,
        }
    }

    pub const fn generation(self) -> u8 {
        match self {
            HaceVersion::Ast2400 => 0,
            HaceVersion::Ast2500 => 5,
            HaceVersion::Ast2600 => 6,
        }
    }

    /// Whether cipher results go to their own region instead of
    /// overwriting the source.
    pub const fn has_dst_region(self) -> bool {
        matches!(self, HaceVersion::Ast2600)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HaceConfig {
    pub version: HaceVersion,
    /// Cipher context + source region.
    pub cipher_dma_len: usize,
    /// Hash digest + source region.
    pub hash_dma_len: usize,
    /// Cipher destination region, only allocated when the version has one.
    pub dst_dma_len: usize,
}

impl HaceConfig {
    pub const fn new(version: HaceVersion) -> Self {
        Self {
            version,
            cipher_dma_len: DEFAULT_DMA_LEN,
            hash_dma_len: DEFAULT_DMA_LEN,
            dst_dma_len: DEFAULT_DMA_LEN,
        }
    }

    pub fn from_compatible(compatible: &str) -> Option<Self> {
        HaceVersion::from_compatible(compatible).map(Self::new)
    }

    /// Bytes of DMA memory bring-up will take, before alignment padding.
    pub fn dma_footprint(&self) -> usize {
        let dst = if self.version.has_dst_region() {
            self.dst_dma_len
        } else {
            0
        };
        self.cipher_dma_len + self.hash_dma_len + dst
    }
}
