//! 9-axis IMU events.
//!
//! Acceleration, angular rate, temperature and magnetic field, sampled
//! together by the inertial measurement unit next to the sensor.
//!
//! Record layout (48 bytes, little-endian):
//!
//! ```text
//! offset  0  u32 info       [0] valid, other bits unused
//! offset  4  i32 timestamp  31 bits used
//! offset  8  f32 accel_x    g (9.81 m/s²)
//! offset 12  f32 accel_y
//! offset 16  f32 accel_z
//! offset 20  f32 gyro_x     °/s
//! offset 24  f32 gyro_y
//! offset 28  f32 gyro_z
//! offset 32  f32 temp       °C
//! offset 36  f32 comp_x     µT
//! offset 40  f32 comp_y
//! offset 44  f32 comp_z
//! ```
//!
//! Floats travel as their raw IEEE-754 bit patterns, so every value,
//! including NaN payloads, survives a round trip unchanged.

use crate::event::{Event, EventKind, EventMut, EventRef};
use crate::header::EventType;
use crate::packet::EventPacket;

const TIMESTAMP: usize = 4;
const ACCEL_X: usize = 8;
const ACCEL_Y: usize = 12;
const ACCEL_Z: usize = 16;
const GYRO_X: usize = 20;
const GYRO_Y: usize = 24;
const GYRO_Z: usize = 28;
const TEMP: usize = 32;
const COMP_X: usize = 36;
const COMP_Y: usize = 40;
const COMP_Z: usize = 44;

/// Marker for the 9-axis IMU event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Imu9;

impl EventKind for Imu9 {
    const EVENT_TYPE: EventType = EventType::Imu9;
    const SIZE: usize = 48;
    const TS_OFFSET: usize = TIMESTAMP;
    const NAME: &'static str = "IMU9 Event";
}

pub type Imu9Packet = EventPacket<Imu9>;
pub type Imu9Event<'a> = EventRef<'a, Imu9>;
pub type Imu9EventMut<'a> = EventMut<'a, Imu9>;

/// All measurements of one IMU sample, in record order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Imu9Sample {
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
    pub temp: f32,
    pub comp: [f32; 3],
}

impl<B: AsRef<[u8]>> Event<B, Imu9> {
    /// Acceleration along X, in g.
    #[inline]
    pub fn accel_x(&self) -> f32 {
        self.read_f32(ACCEL_X)
    }

    #[inline]
    pub fn accel_y(&self) -> f32 {
        self.read_f32(ACCEL_Y)
    }

    #[inline]
    pub fn accel_z(&self) -> f32 {
        self.read_f32(ACCEL_Z)
    }

    /// Rotation around X, in °/s.
    #[inline]
    pub fn gyro_x(&self) -> f32 {
        self.read_f32(GYRO_X)
    }

    #[inline]
    pub fn gyro_y(&self) -> f32 {
        self.read_f32(GYRO_Y)
    }

    #[inline]
    pub fn gyro_z(&self) -> f32 {
        self.read_f32(GYRO_Z)
    }

    /// Temperature, in °C.
    #[inline]
    pub fn temp(&self) -> f32 {
        self.read_f32(TEMP)
    }

    /// Magnetic flux density along X, in µT.
    #[inline]
    pub fn comp_x(&self) -> f32 {
        self.read_f32(COMP_X)
    }

    #[inline]
    pub fn comp_y(&self) -> f32 {
        self.read_f32(COMP_Y)
    }

    #[inline]
    pub fn comp_z(&self) -> f32 {
        self.read_f32(COMP_Z)
    }

    pub fn sample(&self) -> Imu9Sample {
        Imu9Sample {
            accel: [self.accel_x(), self.accel_y(), self.accel_z()],
            gyro: [self.gyro_x(), self.gyro_y(), self.gyro_z()],
            temp: self.temp(),
            comp: [self.comp_x(), self.comp_y(), self.comp_z()],
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Event<B, Imu9> {
    #[inline]
    pub fn set_accel_x(&mut self, accel_x: f32) {
        self.write_f32(ACCEL_X, accel_x);
    }

    #[inline]
    pub fn set_accel_y(&mut self, accel_y: f32) {
        self.write_f32(ACCEL_Y, accel_y);
    }

    #[inline]
    pub fn set_accel_z(&mut self, accel_z: f32) {
        self.write_f32(ACCEL_Z, accel_z);
    }

    #[inline]
    pub fn set_gyro_x(&mut self, gyro_x: f32) {
        self.write_f32(GYRO_X, gyro_x);
    }

    #[inline]
    pub fn set_gyro_y(&mut self, gyro_y: f32) {
        self.write_f32(GYRO_Y, gyro_y);
    }

    #[inline]
    pub fn set_gyro_z(&mut self, gyro_z: f32) {
        self.write_f32(GYRO_Z, gyro_z);
    }

    #[inline]
    pub fn set_temp(&mut self, temp: f32) {
        self.write_f32(TEMP, temp);
    }

    #[inline]
    pub fn set_comp_x(&mut self, comp_x: f32) {
        self.write_f32(COMP_X, comp_x);
    }

    #[inline]
    pub fn set_comp_y(&mut self, comp_y: f32) {
        self.write_f32(COMP_Y, comp_y);
    }

    #[inline]
    pub fn set_comp_z(&mut self, comp_z: f32) {
        self.write_f32(COMP_Z, comp_z);
    }

    /// Writes all measurements at once.
    pub fn set_sample(&mut self, sample: &Imu9Sample) {
        self.set_accel_x(sample.accel[0]);
        self.set_accel_y(sample.accel[1]);
        self.set_accel_z(sample.accel[2]);
        self.set_gyro_x(sample.gyro[0]);
        self.set_gyro_y(sample.gyro[1]);
        self.set_gyro_z(sample.gyro[2]);
        self.set_temp(sample.temp);
        self.set_comp_x(sample.comp[0]);
        self.set_comp_y(sample.comp[1]);
        self.set_comp_z(sample.comp[2]);
    }
}
