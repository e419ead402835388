//! Minimal ROS 2 CDR codec for the two message types the replay reads:
//! `sensor_msgs/msg/Imu` and `sensor_msgs/msg/Image`.
//!
//! Only the fields the replay needs are interpreted. Covariances and
//! orientation are read past and written as "unknown".

use crate::types::{CameraImage, ImuSample, Timestamp};
use image::GrayImage;
use nalgebra::Vector3;

const ENCAPSULATION_LEN: usize = 4;
const CDR_BE: [u8; 2] = [0x00, 0x00];
const CDR_LE: [u8; 2] = [0x00, 0x01];

/// Pixel encodings accepted for camera frames.
pub const MONO_ENCODINGS: &[&str] = &["mono8", "8UC1"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CdrError {
    #[error("buffer truncated at offset {offset}, {needed} more bytes needed")]
    Truncated { offset: usize, needed: usize },

    #[error("unsupported CDR encapsulation {0:02x?}")]
    BadEncapsulation([u8; 2]),

    #[error("string field is not valid UTF-8")]
    InvalidString,

    #[error("unsupported image encoding '{0}'")]
    UnsupportedEncoding(String),

    #[error("image row stride {step} is smaller than width {width}")]
    BadStride { width: u32, step: u32 },

    #[error("image data has {actual} bytes, {expected} expected")]
    ShortPixelData { expected: usize, actual: usize },
}

/// Cursor over a CDR payload. Alignment is relative to the end of the
/// encapsulation header.
pub struct CdrReader<'a> {
    body: &'a [u8],
    pos: usize,
    little_endian: bool,
}

impl<'a> CdrReader<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self, CdrError> {
        if data.len() < ENCAPSULATION_LEN {
            return Err(CdrError::Truncated {
                offset: 0,
                needed: ENCAPSULATION_LEN - data.len(),
            });
        }
        let id = [data[0], data[1]];
        let little_endian = match id {
            CDR_LE => true,
            CDR_BE => false,
            other => return Err(CdrError::BadEncapsulation(other)),
        };
        Ok(Self {
            body: &data[ENCAPSULATION_LEN..],
            pos: 0,
            little_endian,
        })
    }

    fn align(&mut self, n: usize) {
        self.pos = self.pos.next_multiple_of(n);
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CdrError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.body.len())
            .ok_or_else(|| CdrError::Truncated {
                offset: ENCAPSULATION_LEN + self.pos,
                needed: self.pos.saturating_add(n) - self.body.len(),
            })?;
        let bytes = &self.body[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CdrError> {
        self.align(N);
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CdrError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32, CdrError> {
        let bytes = self.take_array::<4>()?;
        Ok(if self.little_endian {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        })
    }

    pub fn read_i32(&mut self) -> Result<i32, CdrError> {
        let bytes = self.take_array::<4>()?;
        Ok(if self.little_endian {
            i32::from_le_bytes(bytes)
        } else {
            i32::from_be_bytes(bytes)
        })
    }

    pub fn read_f64(&mut self) -> Result<f64, CdrError> {
        let bytes = self.take_array::<8>()?;
        Ok(if self.little_endian {
            f64::from_le_bytes(bytes)
        } else {
            f64::from_be_bytes(bytes)
        })
    }

    pub fn read_vector3(&mut self) -> Result<Vector3<f64>, CdrError> {
        Ok(Vector3::new(
            self.read_f64()?,
            self.read_f64()?,
            self.read_f64()?,
        ))
    }

    pub fn skip_f64s(&mut self, count: usize) -> Result<(), CdrError> {
        self.align(8);
        self.take(count * 8)?;
        Ok(())
    }

    /// Length-prefixed byte sequence.
    pub fn read_bytes(&mut self) -> Result<&'a [u8], CdrError> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }

    /// Length-prefixed string; the length counts the trailing NUL.
    pub fn read_string(&mut self) -> Result<&'a str, CdrError> {
        let raw = self.read_bytes()?;
        let raw = raw.strip_suffix(&[0]).unwrap_or(raw);
        std::str::from_utf8(raw).map_err(|_| CdrError::InvalidString)
    }

    /// `builtin_interfaces/Time`.
    pub fn read_time(&mut self) -> Result<Timestamp, CdrError> {
        let sec = self.read_i32()?;
        let nanosec = self.read_u32()?;
        Ok(Timestamp::from_ros_time(sec, nanosec))
    }
}

/// Little-endian CDR serializer.
pub struct CdrWriter {
    buf: Vec<u8>,
}

impl Default for CdrWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl CdrWriter {
    pub fn new() -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&[CDR_LE[0], CDR_LE[1], 0, 0]);
        Self { buf }
    }

    fn align(&mut self, n: usize) {
        let pos = self.buf.len() - ENCAPSULATION_LEN;
        let padded = pos.next_multiple_of(n);
        self.buf.resize(ENCAPSULATION_LEN + padded, 0);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.align(4);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.align(4);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.align(8);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_vector3(&mut self, value: &Vector3<f64>) {
        for component in value.iter() {
            self.write_f64(*component);
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_u32(value.len() as u32 + 1);
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
    }

    pub fn write_time(&mut self, timestamp: Timestamp) {
        let (sec, nanosec) = timestamp.to_ros_time();
        self.write_i32(sec);
        self.write_u32(nanosec);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Decoding of a record payload read from the log.
pub trait Decode: Sized {
    /// Read only the header stamp.
    fn stamp(data: &[u8]) -> Result<Timestamp, CdrError> {
        CdrReader::new(data)?.read_time()
    }

    fn decode(data: &[u8]) -> Result<Self, CdrError>;
}

/// Encoding of a record payload written to the log.
pub trait Encode {
    /// ROS 2 type name stored as the channel schema.
    const SCHEMA_NAME: &'static str;

    fn encode(&self, frame_id: &str) -> Vec<u8>;
}

impl Decode for ImuSample {
    fn decode(data: &[u8]) -> Result<Self, CdrError> {
        let mut reader = CdrReader::new(data)?;
        let timestamp = reader.read_time()?;
        let _frame_id = reader.read_string()?;

        // orientation and its covariance
        reader.skip_f64s(4 + 9)?;
        let angular_velocity = reader.read_vector3()?;
        reader.skip_f64s(9)?;
        let linear_acceleration = reader.read_vector3()?;
        reader.skip_f64s(9)?;

        Ok(ImuSample {
            timestamp,
            angular_velocity,
            linear_acceleration,
        })
    }
}

impl Encode for ImuSample {
    const SCHEMA_NAME: &'static str = "sensor_msgs/msg/Imu";

    fn encode(&self, frame_id: &str) -> Vec<u8> {
        let mut writer = CdrWriter::new();
        writer.write_time(self.timestamp);
        writer.write_string(frame_id);

        // identity orientation, flagged as unavailable
        for value in [0.0, 0.0, 0.0, 1.0] {
            writer.write_f64(value);
        }
        write_covariance(&mut writer, -1.0);
        writer.write_vector3(&self.angular_velocity);
        write_covariance(&mut writer, 0.0);
        writer.write_vector3(&self.linear_acceleration);
        write_covariance(&mut writer, 0.0);
        writer.into_bytes()
    }
}

fn write_covariance(writer: &mut CdrWriter, first: f64) {
    writer.write_f64(first);
    for _ in 1..9 {
        writer.write_f64(0.0);
    }
}

impl Decode for CameraImage {
    fn decode(data: &[u8]) -> Result<Self, CdrError> {
        let mut reader = CdrReader::new(data)?;
        let timestamp = reader.read_time()?;
        let _frame_id = reader.read_string()?;
        let height = reader.read_u32()?;
        let width = reader.read_u32()?;
        let encoding = reader.read_string()?;
        let _is_bigendian = reader.read_u8()?;
        let step = reader.read_u32()?;
        let pixels = reader.read_bytes()?;

        if !MONO_ENCODINGS.contains(&encoding) {
            return Err(CdrError::UnsupportedEncoding(encoding.to_string()));
        }
        if step < width {
            return Err(CdrError::BadStride { width, step });
        }

        let image = gray_from_rows(width, height, step, pixels)?;
        Ok(CameraImage { timestamp, image })
    }
}

/// Pack possibly padded rows into a tightly packed gray image.
fn gray_from_rows(width: u32, height: u32, step: u32, pixels: &[u8]) -> Result<GrayImage, CdrError> {
    let (width_us, height_us, step_us) = (width as usize, height as usize, step as usize);
    let expected = match height_us {
        0 => 0,
        rows => (rows - 1) * step_us + width_us,
    };
    if pixels.len() < expected {
        return Err(CdrError::ShortPixelData {
            expected,
            actual: pixels.len(),
        });
    }

    let packed: Vec<u8> = if step == width {
        pixels[..width_us * height_us].to_vec()
    } else {
        (0..height_us)
            .flat_map(|row| &pixels[row * step_us..row * step_us + width_us])
            .copied()
            .collect()
    };

    GrayImage::from_raw(width, height, packed).ok_or(CdrError::ShortPixelData {
        expected,
        actual: pixels.len(),
    })
}

impl Encode for CameraImage {
    const SCHEMA_NAME: &'static str = "sensor_msgs/msg/Image";

    fn encode(&self, frame_id: &str) -> Vec<u8> {
        let (width, height) = self.image.dimensions();
        let mut writer = CdrWriter::new();
        writer.write_time(self.timestamp);
        writer.write_string(frame_id);
        writer.write_u32(height);
        writer.write_u32(width);
        writer.write_string("mono8");
        writer.write_u8(0);
        writer.write_u32(width);
        writer.write_bytes(self.image.as_raw());
        writer.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_image(encoding: &str, width: u32, height: u32, step: u32, data: &[u8]) -> Vec<u8> {
        let mut writer = CdrWriter::new();
        writer.write_time(Timestamp::from_ros_time(7, 250));
        writer.write_string("cam0");
        writer.write_u32(height);
        writer.write_u32(width);
        writer.write_string(encoding);
        writer.write_u8(0);
        writer.write_u32(step);
        writer.write_bytes(data);
        writer.into_bytes()
    }

    #[test]
    fn test_imu_fields() {
        let sample = ImuSample::new(
            Timestamp::from_ros_time(1_403_636_579, 758_555_648),
            Vector3::new(-0.099, 0.142, 0.026),
            Vector3::new(8.13, -0.37, -2.4),
        );
        let bytes = sample.encode("imu4");

        assert_eq!(ImuSample::stamp(&bytes).unwrap(), sample.timestamp);
        assert_eq!(ImuSample::decode(&bytes).unwrap(), sample);
    }

    #[test]
    fn test_imu_layout_is_aligned() {
        // stamp + length + "imu\0" fill 16 body bytes, so no padding before the f64s
        let sample = ImuSample::new(Timestamp::ZERO, Vector3::zeros(), Vector3::zeros());
        let bytes = sample.encode("imu");
        assert_eq!(bytes.len(), 4 + 16 + (4 + 9 + 3 + 9 + 3 + 9) * 8);
    }

    #[test]
    fn test_big_endian_header() {
        let mut bytes = vec![0x00, 0x00, 0x00, 0x00];
        bytes.extend_from_slice(&5i32.to_be_bytes());
        bytes.extend_from_slice(&9u32.to_be_bytes());
        assert_eq!(
            ImuSample::stamp(&bytes).unwrap(),
            Timestamp::from_ros_time(5, 9)
        );
    }

    #[test]
    fn test_bad_encapsulation() {
        let bytes = [0x00, 0x07, 0x00, 0x00, 0, 0, 0, 0];
        assert_eq!(
            ImuSample::stamp(&bytes),
            Err(CdrError::BadEncapsulation([0x00, 0x07]))
        );
    }

    #[test]
    fn test_truncated_imu() {
        let sample = ImuSample::new(Timestamp::ZERO, Vector3::x(), Vector3::y());
        let bytes = sample.encode("imu");
        let err = ImuSample::decode(&bytes[..bytes.len() - 10]).unwrap_err();
        assert!(matches!(err, CdrError::Truncated { .. }));
        assert!(matches!(
            ImuSample::stamp(&bytes[..2]),
            Err(CdrError::Truncated { offset: 0, .. })
        ));
    }

    #[test]
    fn test_image_packed() {
        let data: Vec<u8> = (0..12).collect();
        let bytes = raw_image("mono8", 4, 3, 4, &data);
        let frame = CameraImage::decode(&bytes).unwrap();

        assert_eq!(frame.timestamp, Timestamp::from_ros_time(7, 250));
        assert_eq!(frame.image.dimensions(), (4, 3));
        assert_eq!(frame.image.as_raw(), &data);
    }

    #[test]
    fn test_image_strided_rows_are_packed() {
        #[rustfmt::skip]
        let data = [
            1, 2, 3, 0xff, 0xff,
            4, 5, 6, 0xff, 0xff,
        ];
        let bytes = raw_image("8UC1", 3, 2, 5, &data);
        let frame = CameraImage::decode(&bytes).unwrap();
        assert_eq!(frame.image.as_raw(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_image_rejects_color() {
        let bytes = raw_image("rgb8", 1, 1, 3, &[0, 0, 0]);
        assert_eq!(
            CameraImage::decode(&bytes),
            Err(CdrError::UnsupportedEncoding("rgb8".into()))
        );
    }

    #[test]
    fn test_image_short_data() {
        let bytes = raw_image("mono8", 4, 4, 4, &[0; 10]);
        assert_eq!(
            CameraImage::decode(&bytes),
            Err(CdrError::ShortPixelData {
                expected: 16,
                actual: 10
            })
        );
    }

    #[test]
    fn test_image_bad_stride() {
        let bytes = raw_image("mono8", 4, 1, 2, &[0; 4]);
        assert_eq!(
            CameraImage::decode(&bytes),
            Err(CdrError::BadStride { width: 4, step: 2 })
        );
    }

    #[test]
    fn test_image_encode_decode() {
        let image = GrayImage::from_fn(5, 2, |x, y| image::Luma([(x * 10 + y) as u8]));
        let frame = CameraImage {
            timestamp: Timestamp::from_ros_time(3, 4),
            image,
        };
        assert_eq!(CameraImage::decode(&frame.encode("cam0")).unwrap(), frame);
    }
}
