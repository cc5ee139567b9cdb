use bytes::{BufMut, BytesMut};

/// Sequential little-endian field writer for message payloads.
pub struct PayloadWriter<'a> {
    dst: &'a mut BytesMut,
}

impl<'a> PayloadWriter<'a> {
    pub fn new(dst: &'a mut BytesMut) -> Self {
        Self { dst }
    }

    pub fn put_u8(&mut self, v: u8) {
        self.dst.put_u8(v);
    }

    pub fn put_i8(&mut self, v: i8) {
        self.dst.put_i8(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.dst.put_u16_le(v);
    }

    pub fn put_i16(&mut self, v: i16) {
        self.dst.put_i16_le(v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.dst.put_u32_le(v);
    }

    pub fn put_i32(&mut self, v: i32) {
        self.dst.put_i32_le(v);
    }

    pub fn put_u64(&mut self, v: u64) {
        self.dst.put_u64_le(v);
    }

    pub fn put_i64(&mut self, v: i64) {
        self.dst.put_i64_le(v);
    }

    pub fn put_f32(&mut self, v: f32) {
        self.dst.put_f32_le(v);
    }

    pub fn put_f64(&mut self, v: f64) {
        self.dst.put_f64_le(v);
    }

    /// Write a fixed-size byte or char array, zero-padding or cutting `bytes` to `len`.
    pub fn put_bytes(&mut self, bytes: &[u8], len: usize) {
        let n = bytes.len().min(len);
        self.dst.put_slice(&bytes[..n]);
        self.dst.put_bytes(0, len - n);
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.dst.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dst.is_empty()
    }
}

/// Sequential little-endian field reader.
///
/// Reads past the end of the received payload yield zeros. MAVLink 2 senders
/// trim trailing zero bytes, and older senders omit extension fields, so a
/// short payload is normal and must decode as if the missing tail were zero.
pub struct PayloadReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        let start = self.pos.min(self.buf.len());
        let end = (self.pos + N).min(self.buf.len());
        out[..end - start].copy_from_slice(&self.buf[start..end]);
        self.pos += N;
        out
    }

    pub fn u8(&mut self) -> u8 {
        u8::from_le_bytes(self.take())
    }

    pub fn i8(&mut self) -> i8 {
        i8::from_le_bytes(self.take())
    }

    pub fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    pub fn i16(&mut self) -> i16 {
        i16::from_le_bytes(self.take())
    }

    pub fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    pub fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }

    pub fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take())
    }

    pub fn i64(&mut self) -> i64 {
        i64::from_le_bytes(self.take())
    }

    pub fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.take())
    }

    pub fn f64(&mut self) -> f64 {
        f64::from_le_bytes(self.take())
    }

    /// Read a fixed-size byte array of `len` elements.
    pub fn bytes(&mut self, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        let start = self.pos.min(self.buf.len());
        let end = (self.pos + len).min(self.buf.len());
        out[..end - start].copy_from_slice(&self.buf[start..end]);
        self.pos += len;
        out
    }

    /// Read a NUL-terminated char array of `len` bytes.
    pub fn chars(&mut self, len: usize) -> String {
        let raw = self.bytes(len);
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        String::from_utf8_lossy(&raw[..end]).into_owned()
    }

    /// Offset of the next field.
    pub fn position(&self) -> usize {
        self.pos
    }
}
