#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use mal_transport::core::{Packet, PacketCodec};
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Packet parsing and streaming decode must never panic
    let _ = Packet::from_bytes(data);

    let mut codec = PacketCodec::new(64 * 1024);
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_)) = codec.decode(&mut buf) {}
});
