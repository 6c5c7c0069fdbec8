//! Utility functions for eqiva-core.

use btleplug::api::BDAddr;

use eqiva_types::DeviceAddress;

/// Format a payload as lowercase hex for logging.
///
/// ```
/// use eqiva_core::util::format_hex;
///
/// assert_eq!(format_hex(&[0x02, 0x01, 0xAB]), "0201ab");
/// ```
pub fn format_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

/// Convert a btleplug address into a [`DeviceAddress`].
pub fn device_address(addr: BDAddr) -> DeviceAddress {
    DeviceAddress::new(addr.into_inner())
}

/// Convert a [`DeviceAddress`] into a btleplug address.
pub fn bd_addr(address: DeviceAddress) -> BDAddr {
    BDAddr::from(address.bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hex_empty() {
        assert_eq!(format_hex(&[]), "");
    }

    #[test]
    fn test_address_conversion() {
        let address: DeviceAddress = "00:1A:22:0C:3B:7F".parse().unwrap();
        let bd = bd_addr(address);
        assert_eq!(bd.to_string(), "00:1A:22:0C:3B:7F");
        assert_eq!(device_address(bd), address);
    }
}
