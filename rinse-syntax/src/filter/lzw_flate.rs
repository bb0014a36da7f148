use crate::object::Dict;
use crate::object::dict::keys::{BITS_PER_COMPONENT, COLORS, COLUMNS, EARLY_CHANGE, PREDICTOR};

struct PredictorParams {
    predictor: u8,
    colors: u8,
    bits_per_component: u8,
    columns: usize,
    early_change: bool,
}

impl PredictorParams {
    fn bits_per_pixel(&self) -> usize {
        usize::from(self.bits_per_component) * usize::from(self.colors)
    }

    fn bytes_per_pixel(&self) -> usize {
        self.bits_per_pixel().div_ceil(8).max(1)
    }

    fn row_length_in_bytes(&self) -> Option<usize> {
        Some(self.columns.checked_mul(self.bits_per_pixel())?.div_ceil(8))
    }

    fn from_params(dict: Option<&Dict>) -> Option<Self> {
        let Some(dict) = dict else {
            return Some(Self::default());
        };

        let get = |key: &[u8], default: i64| dict.get_i64(key).unwrap_or(default);

        Some(Self {
            predictor: u8::try_from(get(PREDICTOR, 1)).ok()?,
            colors: u8::try_from(get(COLORS, 1)).ok()?.max(1),
            bits_per_component: u8::try_from(get(BITS_PER_COMPONENT, 8)).ok()?,
            columns: usize::try_from(get(COLUMNS, 1)).ok()?.max(1),
            early_change: get(EARLY_CHANGE, 1) != 0,
        })
    }
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
            early_change: true,
        }
    }
}

fn apply_predictor(data: Vec<u8>, params: &PredictorParams) -> Option<Vec<u8>> {
    if params.predictor == 1 || data.is_empty() {
        return Some(data);
    }

    // A row can't be longer than the whole data, which also bounds the size of the output.
    let row_len = params
        .row_length_in_bytes()
        .filter(|len| (1..=data.len()).contains(len))?;

    match params.predictor {
        2 => apply_tiff(data, row_len, params),
        10..=15 => apply_png(&data, row_len, params),
        _ => None,
    }
}

fn apply_tiff(mut data: Vec<u8>, row_len: usize, params: &PredictorParams) -> Option<Vec<u8>> {
    // Only byte-aligned samples are supported.
    if params.bits_per_component != 8 {
        return None;
    }

    let bpp = params.bytes_per_pixel();

    for row in data.chunks_mut(row_len) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }

    Some(data)
}

fn apply_png(data: &[u8], row_len: usize, params: &PredictorParams) -> Option<Vec<u8>> {
    let bpp = params.bytes_per_pixel();
    // Each row starts with a byte selecting the predictor for that row.
    let num_rows = data.len().div_ceil(row_len + 1);

    let mut out = vec![0_u8; num_rows * row_len];
    let mut prev_row = vec![0_u8; row_len];

    for (i, chunk) in data.chunks(row_len + 1).enumerate() {
        let (&predictor, input) = chunk.split_first()?;
        let row = &mut out[i * row_len..(i + 1) * row_len];
        // A truncated last row is padded with zeros.
        row[..input.len()].copy_from_slice(input);

        for j in 0..row_len {
            let left = if j >= bpp { row[j - bpp] } else { 0 };
            let up = prev_row[j];
            let up_left = if j >= bpp { prev_row[j - bpp] } else { 0 };

            row[j] = match predictor {
                0 => row[j],
                1 => row[j].wrapping_add(left),
                2 => row[j].wrapping_add(up),
                3 => row[j].wrapping_add(((u16::from(left) + u16::from(up)) / 2) as u8),
                4 => row[j].wrapping_add(paeth(left, up, up_left)),
                _ => return None,
            };
        }

        prev_row.copy_from_slice(row);
    }

    Some(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

pub mod flate {
    //! Flate (zlib) decoding and encoding.

    use super::{PredictorParams, apply_predictor};
    use crate::object::Dict;
    use flate2::write::ZlibEncoder;
    use flate2::{Compression, Decompress, FlushDecompress, Status};
    use std::io::Write;

    const COMPRESSION_LEVEL: u32 = 6;

    pub(crate) fn decode(data: &[u8], params: Option<&Dict>) -> Option<Vec<u8>> {
        let params = PredictorParams::from_params(params)?;
        let decoded = inflate(data, true).or_else(|| inflate(data, false))?;

        apply_predictor(decoded, &params)
    }

    // Inflate a zlib stream, or a raw deflate stream without the zlib header. Only streams
    // that run until their end marker are accepted, truncated ones count as undecodable.
    fn inflate(data: &[u8], zlib_header: bool) -> Option<Vec<u8>> {
        let mut decoder = Decompress::new(zlib_header);
        let mut out = Vec::with_capacity(data.len().saturating_mul(2).max(64));

        loop {
            if out.len() == out.capacity() {
                out.reserve(out.len());
            }

            let consumed = usize::try_from(decoder.total_in()).ok()?;
            let before = (decoder.total_in(), decoder.total_out());
            let status = decoder
                .decompress_vec(data.get(consumed..)?, &mut out, FlushDecompress::Finish)
                .ok()?;

            match status {
                Status::StreamEnd => return Some(out),
                Status::Ok | Status::BufError => {
                    let stalled = before == (decoder.total_in(), decoder.total_out());

                    // No progress even though there is room left: the input ended early.
                    if stalled && out.len() < out.capacity() {
                        return None;
                    }
                }
            }
        }
    }

    /// Encode data with zlib.
    pub fn encode(data: &[u8]) -> Vec<u8> {
        let mut e = ZlibEncoder::new(Vec::new(), Compression::new(COMPRESSION_LEVEL));
        e.write_all(data).expect("writing into a vector never fails");
        e.finish().expect("writing into a vector never fails")
    }
}

pub(crate) mod lzw {
    use super::{PredictorParams, apply_predictor};
    use crate::object::Dict;

    pub(crate) fn decode(data: &[u8], params: Option<&Dict>) -> Option<Vec<u8>> {
        let params = PredictorParams::from_params(params)?;
        let decoded = decode_impl(data, params.early_change)?;

        apply_predictor(decoded, &params)
    }

    const CLEAR_TABLE: usize = 256;
    const EOD: usize = 257;
    const MAX_ENTRIES: usize = 4096;
    const INITIAL_SIZE: usize = 258;

    struct BitReader<'a> {
        data: &'a [u8],
        bit_pos: usize,
    }

    impl BitReader<'_> {
        fn read(&mut self, bits: u8) -> Option<usize> {
            let mut value = 0_usize;

            for _ in 0..bits {
                let byte = *self.data.get(self.bit_pos / 8)?;
                let bit = (byte >> (7 - (self.bit_pos % 8))) & 1;
                value = value << 1 | usize::from(bit);
                self.bit_pos += 1;
            }

            Some(value)
        }
    }

    fn decode_impl(data: &[u8], early_change: bool) -> Option<Vec<u8>> {
        let mut table = Table::new(early_change);
        let mut reader = BitReader { data, bit_pos: 0 };
        let mut decoded = vec![];
        let mut prev: Option<usize> = None;

        // A missing EOD marker is tolerated.
        while let Some(next) = reader.read(table.code_length()) {
            match next {
                CLEAR_TABLE => {
                    table.clear();
                    prev = None;
                }
                EOD => break,
                new => {
                    if let Some(entry) = table.get(new) {
                        let first = entry[0];
                        decoded.extend_from_slice(entry);

                        if let Some(prev) = prev {
                            let _ = table.register(prev, first);
                        }
                    } else {
                        let prev = prev?;
                        let new_byte = table.get(prev)?[0];

                        decoded.extend_from_slice(table.register(prev, new_byte)?);
                    }

                    prev = Some(new);
                }
            }
        }

        Some(decoded)
    }

    struct Table {
        early_change: bool,
        entries: Vec<Vec<u8>>,
    }

    impl Table {
        fn new(early_change: bool) -> Self {
            let mut entries: Vec<_> = (0..=255).map(|b| vec![b]).collect();

            // Clear table and EOD don't have any data.
            entries.push(vec![0]);
            entries.push(vec![0]);

            Self {
                early_change,
                entries,
            }
        }

        fn register(&mut self, prev: usize, new_byte: u8) -> Option<&[u8]> {
            if self.entries.len() >= MAX_ENTRIES {
                return None;
            }

            let mut entry = self.get(prev)?.to_vec();
            entry.push(new_byte);
            self.entries.push(entry);

            self.entries.last().map(Vec::as_slice)
        }

        fn get(&self, index: usize) -> Option<&[u8]> {
            self.entries.get(index).map(Vec::as_slice)
        }

        fn clear(&mut self) {
            self.entries.truncate(INITIAL_SIZE);
        }

        fn code_length(&self) -> u8 {
            let adjusted = self.entries.len() + usize::from(self.early_change);

            match adjusted {
                0..512 => 9,
                512..1024 => 10,
                1024..2048 => 11,
                _ => 12,
            }
        }
    }
}
