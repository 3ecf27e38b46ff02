#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(mac) = creak::addr::parse_mac(text) {
            assert_eq!(creak::addr::parse_mac(&mac.to_string()).ok(), Some(mac));
        }
        let _ = creak::vendor::vendor_prefix_octets(text);
    }
});
