// src/io/mod.rs
//
// Device IO. The only transport is a USB serial link to the mesh device.

pub mod serial;
