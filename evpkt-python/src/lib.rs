//! Python bindings for the event packet codec with numpy column access.
//!
//! Packets are exposed as `PolarityPacket` and `Imu9Packet` objects that own
//! the packet bytes. Per-event access goes through slot indices; bulk access
//! goes through numpy columns built from the valid events.

use evpkt_core::{AnyEventPacket, Imu9Sample, LogLevel, PacketError, ReadError};
use numpy::{IntoPyArray, PyArray1};
use pyo3::exceptions::{PyIOError, PyIndexError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict};
use std::str::FromStr;

fn packet_err(e: PacketError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn read_err(e: ReadError) -> PyErr {
    match e {
        ReadError::Io(e) => PyIOError::new_err(format!("Failed to read file: {}", e)),
        other => PyValueError::new_err(other.to_string()),
    }
}

fn no_slot(index: i32, capacity: i32) -> PyErr {
    PyIndexError::new_err(format!(
        "event index {} out of range for capacity {}",
        index, capacity
    ))
}

/// A packet of polarity (brightness change) events.
#[pyclass]
pub struct PolarityPacket {
    inner: evpkt_core::PolarityPacket,
}

#[pymethods]
impl PolarityPacket {
    /// Allocates an empty packet with room for `capacity` events.
    #[new]
    #[pyo3(signature = (capacity, source=0, ts_overflow=0))]
    fn new(capacity: i32, source: i16, ts_overflow: i32) -> PyResult<Self> {
        let inner = evpkt_core::PolarityPacket::allocate(capacity, source, ts_overflow).map_err(packet_err)?;
        Ok(Self { inner })
    }

    /// Adopts a packet received as raw bytes.
    #[staticmethod]
    fn from_bytes(data: &[u8]) -> PyResult<Self> {
        let inner = evpkt_core::PolarityPacket::from_bytes(data.to_vec()).map_err(packet_err)?;
        Ok(Self { inner })
    }

    fn __len__(&self) -> usize {
        self.inner.event_number().max(0) as usize
    }

    fn __repr__(&self) -> String {
        format!(
            "PolarityPacket(capacity={}, number={}, valid={}, source={})",
            self.inner.capacity(),
            self.inner.event_number(),
            self.inner.event_valid(),
            self.inner.source()
        )
    }

    #[getter]
    fn capacity(&self) -> i32 {
        self.inner.capacity()
    }

    #[getter]
    fn event_number(&self) -> i32 {
        self.inner.event_number()
    }

    #[getter]
    fn event_valid(&self) -> i32 {
        self.inner.event_valid()
    }

    #[getter]
    fn source(&self) -> i16 {
        self.inner.source()
    }

    #[getter]
    fn ts_overflow(&self) -> i32 {
        self.inner.ts_overflow()
    }

    #[setter]
    fn set_ts_overflow(&mut self, ts_overflow: i32) -> PyResult<()> {
        self.inner.set_ts_overflow(ts_overflow).map_err(packet_err)
    }

    /// Writes the fields of event `index`. The event is not validated.
    #[pyo3(signature = (index, x, y, polarity, timestamp))]
    fn set_event(&mut self, index: i32, x: u16, y: u16, polarity: bool, timestamp: i32) -> PyResult<()> {
        let capacity = self.inner.capacity();
        let mut event = self
            .inner
            .get_event_mut(index)
            .ok_or_else(|| no_slot(index, capacity))?;
        event.set_x(x);
        event.set_y(y);
        event.set_polarity(polarity);
        event.set_timestamp(timestamp).map_err(packet_err)
    }

    /// Returns `(x, y, polarity, timestamp64, valid)` of event `index`.
    fn get_event(&self, index: i32) -> PyResult<(u16, u16, bool, i64, bool)> {
        let event = self
            .inner
            .get_event(index)
            .ok_or_else(|| no_slot(index, self.inner.capacity()))?;
        Ok((
            event.x(),
            event.y(),
            event.polarity(),
            event.timestamp64(),
            event.is_valid(),
        ))
    }

    fn validate(&mut self, index: i32) -> PyResult<()> {
        let capacity = self.inner.capacity();
        self.inner
            .get_event_mut(index)
            .ok_or_else(|| no_slot(index, capacity))?
            .validate()
            .map_err(packet_err)
    }

    fn invalidate(&mut self, index: i32) -> PyResult<()> {
        let capacity = self.inner.capacity();
        self.inner
            .get_event_mut(index)
            .ok_or_else(|| no_slot(index, capacity))?
            .invalidate()
            .map_err(packet_err)
    }

    /// Returns the packet bytes, ready to be sent or written.
    fn to_bytes<'py>(&self, py: Python<'py>) -> &'py PyBytes {
        PyBytes::new(py, self.inner.as_bytes())
    }

    /// X coordinates of the valid events.
    #[getter]
    fn x<'py>(&self, py: Python<'py>) -> &'py PyArray1<u16> {
        let x: Vec<u16> = self.inner.iter_valid().map(|e| e.x()).collect();
        x.into_pyarray(py)
    }

    /// Y coordinates of the valid events.
    #[getter]
    fn y<'py>(&self, py: Python<'py>) -> &'py PyArray1<u16> {
        let y: Vec<u16> = self.inner.iter_valid().map(|e| e.y()).collect();
        y.into_pyarray(py)
    }

    /// Polarities of the valid events: 0 = OFF, 1 = ON.
    #[getter]
    fn polarity<'py>(&self, py: Python<'py>) -> &'py PyArray1<u8> {
        let p: Vec<u8> = self.inner.iter_valid().map(|e| e.polarity() as u8).collect();
        p.into_pyarray(py)
    }

    /// 64-bit timestamps of the valid events.
    #[getter]
    fn timestamp<'py>(&self, py: Python<'py>) -> &'py PyArray1<i64> {
        let t: Vec<i64> = self.inner.iter_valid().map(|e| e.timestamp64()).collect();
        t.into_pyarray(py)
    }

    /// Returns all columns as a dictionary.
    fn to_dict<'py>(&self, py: Python<'py>) -> PyResult<PyObject> {
        let dict = PyDict::new(py);
        dict.set_item("x", self.x(py))?;
        dict.set_item("y", self.y(py))?;
        dict.set_item("polarity", self.polarity(py))?;
        dict.set_item("timestamp", self.timestamp(py))?;
        Ok(dict.into())
    }
}

/// A packet of 9-axis IMU events.
#[pyclass]
pub struct Imu9Packet {
    inner: evpkt_core::Imu9Packet,
}

impl Imu9Packet {
    fn column<'py>(&self, py: Python<'py>, f: impl Fn(&Imu9Sample) -> f32) -> &'py PyArray1<f32> {
        let values: Vec<f32> = self.inner.iter_valid().map(|e| f(&e.sample())).collect();
        values.into_pyarray(py)
    }
}

#[pymethods]
impl Imu9Packet {
    /// Allocates an empty packet with room for `capacity` events.
    #[new]
    #[pyo3(signature = (capacity, source=0, ts_overflow=0))]
    fn new(capacity: i32, source: i16, ts_overflow: i32) -> PyResult<Self> {
        let inner = evpkt_core::Imu9Packet::allocate(capacity, source, ts_overflow).map_err(packet_err)?;
        Ok(Self { inner })
    }

    /// Adopts a packet received as raw bytes.
    #[staticmethod]
    fn from_bytes(data: &[u8]) -> PyResult<Self> {
        let inner = evpkt_core::Imu9Packet::from_bytes(data.to_vec()).map_err(packet_err)?;
        Ok(Self { inner })
    }

    fn __len__(&self) -> usize {
        self.inner.event_number().max(0) as usize
    }

    fn __repr__(&self) -> String {
        format!(
            "Imu9Packet(capacity={}, number={}, valid={}, source={})",
            self.inner.capacity(),
            self.inner.event_number(),
            self.inner.event_valid(),
            self.inner.source()
        )
    }

    #[getter]
    fn capacity(&self) -> i32 {
        self.inner.capacity()
    }

    #[getter]
    fn event_number(&self) -> i32 {
        self.inner.event_number()
    }

    #[getter]
    fn event_valid(&self) -> i32 {
        self.inner.event_valid()
    }

    #[getter]
    fn source(&self) -> i16 {
        self.inner.source()
    }

    #[getter]
    fn ts_overflow(&self) -> i32 {
        self.inner.ts_overflow()
    }

    #[setter]
    fn set_ts_overflow(&mut self, ts_overflow: i32) -> PyResult<()> {
        self.inner.set_ts_overflow(ts_overflow).map_err(packet_err)
    }

    /// Writes the measurements of event `index`. The event is not validated.
    ///
    /// Args:
    ///     accel, gyro, comp: (x, y, z) tuples
    #[pyo3(signature = (index, timestamp, accel, gyro, temp, comp))]
    fn set_event(
        &mut self,
        index: i32,
        timestamp: i32,
        accel: [f32; 3],
        gyro: [f32; 3],
        temp: f32,
        comp: [f32; 3],
    ) -> PyResult<()> {
        let capacity = self.inner.capacity();
        let mut event = self
            .inner
            .get_event_mut(index)
            .ok_or_else(|| no_slot(index, capacity))?;
        event.set_sample(&Imu9Sample {
            accel,
            gyro,
            temp,
            comp,
        });
        event.set_timestamp(timestamp).map_err(packet_err)
    }

    fn validate(&mut self, index: i32) -> PyResult<()> {
        let capacity = self.inner.capacity();
        self.inner
            .get_event_mut(index)
            .ok_or_else(|| no_slot(index, capacity))?
            .validate()
            .map_err(packet_err)
    }

    fn invalidate(&mut self, index: i32) -> PyResult<()> {
        let capacity = self.inner.capacity();
        self.inner
            .get_event_mut(index)
            .ok_or_else(|| no_slot(index, capacity))?
            .invalidate()
            .map_err(packet_err)
    }

    fn to_bytes<'py>(&self, py: Python<'py>) -> &'py PyBytes {
        PyBytes::new(py, self.inner.as_bytes())
    }

    #[getter]
    fn timestamp<'py>(&self, py: Python<'py>) -> &'py PyArray1<i64> {
        let t: Vec<i64> = self.inner.iter_valid().map(|e| e.timestamp64()).collect();
        t.into_pyarray(py)
    }

    #[getter]
    fn accel_x<'py>(&self, py: Python<'py>) -> &'py PyArray1<f32> {
        self.column(py, |s| s.accel[0])
    }

    #[getter]
    fn accel_y<'py>(&self, py: Python<'py>) -> &'py PyArray1<f32> {
        self.column(py, |s| s.accel[1])
    }

    #[getter]
    fn accel_z<'py>(&self, py: Python<'py>) -> &'py PyArray1<f32> {
        self.column(py, |s| s.accel[2])
    }

    #[getter]
    fn gyro_x<'py>(&self, py: Python<'py>) -> &'py PyArray1<f32> {
        self.column(py, |s| s.gyro[0])
    }

    #[getter]
    fn gyro_y<'py>(&self, py: Python<'py>) -> &'py PyArray1<f32> {
        self.column(py, |s| s.gyro[1])
    }

    #[getter]
    fn gyro_z<'py>(&self, py: Python<'py>) -> &'py PyArray1<f32> {
        self.column(py, |s| s.gyro[2])
    }

    /// Temperature in degrees Celsius.
    #[getter]
    fn temp<'py>(&self, py: Python<'py>) -> &'py PyArray1<f32> {
        self.column(py, |s| s.temp)
    }

    #[getter]
    fn comp_x<'py>(&self, py: Python<'py>) -> &'py PyArray1<f32> {
        self.column(py, |s| s.comp[0])
    }

    #[getter]
    fn comp_y<'py>(&self, py: Python<'py>) -> &'py PyArray1<f32> {
        self.column(py, |s| s.comp[1])
    }

    #[getter]
    fn comp_z<'py>(&self, py: Python<'py>) -> &'py PyArray1<f32> {
        self.column(py, |s| s.comp[2])
    }
}

/// Reads every packet of a packet file.
///
/// Args:
///     path: Path to the packet file
///
/// Returns:
///     list: PolarityPacket and Imu9Packet objects in file order
///
/// Example:
///     >>> import evpkt
///     >>> packets = evpkt.read_file("recording.bin")
///     >>> x = packets[0].x  # numpy array of x coordinates
#[pyfunction]
fn read_file(py: Python<'_>, path: &str) -> PyResult<Vec<PyObject>> {
    let packets = evpkt_core::read_file(path).map_err(read_err)?;
    packets
        .into_iter()
        .map(|packet| match packet {
            AnyEventPacket::Polarity(inner) => Ok(Py::new(py, PolarityPacket { inner })?.into_py(py)),
            AnyEventPacket::Imu9(inner) => Ok(Py::new(py, Imu9Packet { inner })?.into_py(py)),
        })
        .collect()
}

/// Sets the minimum severity of codec diagnostics, by name or number 0-7.
#[pyfunction]
fn set_log_level(level: &str) -> PyResult<()> {
    let level = LogLevel::from_str(level).map_err(|e| PyValueError::new_err(e.to_string()))?;
    evpkt_core::set_log_level(level);
    Ok(())
}

/// Event packet codec module for Python.
#[pymodule]
fn _evpkt(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(read_file, m)?)?;
    m.add_function(wrap_pyfunction!(set_log_level, m)?)?;
    m.add_class::<PolarityPacket>()?;
    m.add_class::<Imu9Packet>()?;
    Ok(())
}
