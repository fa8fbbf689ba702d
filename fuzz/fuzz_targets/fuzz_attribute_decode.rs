#![no_main]

use libfuzzer_sys::fuzz_target;
use mal_transport::core::{AttributeDecoder, WireProfile};

fuzz_target!(|data: &[u8]| {
    let Some((&mode, body)) = data.split_first() else {
        return;
    };
    let profile = WireProfile::spp(mode & 1 == 1);

    // Arbitrary bytes must produce values or errors, never panics or hangs
    let mut decoder = AttributeDecoder::from_slice(body, profile);
    while decoder.remaining() != Some(0) {
        if decoder.decode_nullable_attribute().is_err() {
            break;
        }
    }

    let mut decoder = AttributeDecoder::from_slice(body, profile);
    if let Ok(list) = decoder.create_list_decoder(AttributeDecoder::decode_nullable_string) {
        for item in list {
            if item.is_err() {
                break;
            }
        }
    }
});
