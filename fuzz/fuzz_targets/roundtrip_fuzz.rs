#![no_main]
use libfuzzer_sys::fuzz_target;
use vcpatch::vcdiff::{decoder, varint};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // Single window: ADD the whole payload, with its Adler-32.
    let len = data.len() as u32;
    let mut inst = vec![0x01];
    varint::write_u32(&mut inst, len).unwrap();

    let mut body = Vec::new();
    varint::write_u32(&mut body, len).unwrap();
    body.push(0);
    varint::write_u32(&mut body, len).unwrap();
    varint::write_u32(&mut body, inst.len() as u32).unwrap();
    body.push(0);
    body.extend_from_slice(&decoder::compute_adler32(data).to_be_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(&inst);

    let mut patch = vec![0xD6, 0xC3, 0xC4, 0x00, 0x00, 0x04];
    varint::write_u32(&mut patch, body.len() as u32).unwrap();
    patch.extend(body);

    let decoded = decoder::decode_memory(&[], &patch).unwrap();
    assert_eq!(decoded, data);
});
