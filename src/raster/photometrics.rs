use num_enum::{FromPrimitive, IntoPrimitive};

#[derive(Debug, PartialEq, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum PhotometricInterpretation {
    WhiteIsZero = 0,
    BlackIsZero = 1,

    #[num_enum(default)]
    Unknown = 0xFFFF,
}

#[derive(Debug, PartialEq, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum SampleFormat {
    Unsigned = 1,
    Signed = 2,
    Float = 3,
    Undefined = 4,

    #[num_enum(default)]
    Unknown = 0xFFFF,
}

#[derive(Debug, PartialEq, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum PlanarConfiguration {
    Chunky = 1,
    Planar = 2,

    #[num_enum(default)]
    Unknown = 0xFFFF,
}
