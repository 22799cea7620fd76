//! Primitive variables: per-mesh named data channels.
//!
//! A primitive variable couples a name with a storage [`class`]
//! deciding how many values the mesh carries (one, one per face, one
//! per vertex, or one per face corner), a value [`type`], and an
//! optional per-entry array length.  Refinement appends new values to
//! these buffers using the class-specific averaging rules; the buffers
//! therefore always hold every refinement level that has been built so
//! far, addressed by the indices stored on the laths.
//!
//! [`class`]: PrimvarClass
//! [`type`]: PrimvarType

use glam::{Mat4, Vec3, Vec4};

use crate::error::{Error, Result};

/// Storage class of a primitive variable.
///
/// The class determines the buffer size: one value (`Constant`), one
/// per face (`Uniform`), one per vertex (`Varying`, `Vertex`) or one
/// per face corner (`FaceVarying`, `FaceVertex`).  `Vertex` and
/// `FaceVertex` data follow the subdivision masks; `Varying` and
/// `FaceVarying` data interpolate linearly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimvarClass {
    /// One value for the whole mesh.
    Constant,
    /// One value per face, inherited unchanged by sub-faces.
    Uniform,
    /// One value per vertex, interpolated linearly.
    Varying,
    /// One value per vertex, interpolated by the subdivision masks.
    Vertex,
    /// One value per face corner, interpolated linearly.
    FaceVarying,
    /// One value per face corner, interpolated by the subdivision
    /// masks with continuity checks at discontinuities.
    FaceVertex,
}

impl PrimvarClass {
    /// `true` for the two per-vertex classes.
    #[inline]
    pub fn is_per_vertex(self) -> bool {
        matches!(self, PrimvarClass::Varying | PrimvarClass::Vertex)
    }

    /// `true` for the two per-face-corner classes.
    #[inline]
    pub fn is_per_face_vertex(self) -> bool {
        matches!(self, PrimvarClass::FaceVarying | PrimvarClass::FaceVertex)
    }
}

/// Value type of a primitive variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum PrimvarType {
    Float,
    Integer,
    Point,
    Vector,
    Normal,
    HPoint,
    Color,
    Matrix,
    String,
}

/// Typed storage of a primitive variable.
///
/// The buffer length is the class-implied count times the array
/// length.  Data is kept fully typed; the subdivision masks run on the
/// numeric variants and copy the rest.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum PrimvarData {
    Float(Vec<f32>),
    Integer(Vec<i32>),
    Point(Vec<Vec3>),
    Vector(Vec<Vec3>),
    Normal(Vec<Vec3>),
    HPoint(Vec<Vec4>),
    Color(Vec<Vec3>),
    Matrix(Vec<Mat4>),
    String(Vec<String>),
}

impl PrimvarData {
    /// Empty storage of the given type.
    pub fn empty(ty: PrimvarType) -> Self {
        match ty {
            PrimvarType::Float => PrimvarData::Float(Vec::new()),
            PrimvarType::Integer => PrimvarData::Integer(Vec::new()),
            PrimvarType::Point => PrimvarData::Point(Vec::new()),
            PrimvarType::Vector => PrimvarData::Vector(Vec::new()),
            PrimvarType::Normal => PrimvarData::Normal(Vec::new()),
            PrimvarType::HPoint => PrimvarData::HPoint(Vec::new()),
            PrimvarType::Color => PrimvarData::Color(Vec::new()),
            PrimvarType::Matrix => PrimvarData::Matrix(Vec::new()),
            PrimvarType::String => PrimvarData::String(Vec::new()),
        }
    }

    /// Number of stored elements (count times array length).
    pub fn len(&self) -> usize {
        match self {
            PrimvarData::Float(v) => v.len(),
            PrimvarData::Integer(v) => v.len(),
            PrimvarData::Point(v) | PrimvarData::Vector(v) | PrimvarData::Normal(v) => v.len(),
            PrimvarData::HPoint(v) => v.len(),
            PrimvarData::Color(v) => v.len(),
            PrimvarData::Matrix(v) => v.len(),
            PrimvarData::String(v) => v.len(),
        }
    }

    /// `true` if no elements are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resize to `len` elements, filling with the type's default.
    pub fn resize(&mut self, len: usize) {
        match self {
            PrimvarData::Float(v) => v.resize(len, 0.0),
            PrimvarData::Integer(v) => v.resize(len, 0),
            PrimvarData::Point(v) | PrimvarData::Vector(v) | PrimvarData::Normal(v) => {
                v.resize(len, Vec3::ZERO)
            }
            PrimvarData::HPoint(v) => v.resize(len, Vec4::ZERO),
            PrimvarData::Color(v) => v.resize(len, Vec3::ZERO),
            PrimvarData::Matrix(v) => v.resize(len, Mat4::IDENTITY),
            PrimvarData::String(v) => v.resize(len, String::new()),
        }
    }

    /// Copy element `from` of `source` into element `to` of `self`.
    /// Both sides must hold the same type.
    pub fn copy_element(&mut self, to: usize, source: &PrimvarData, from: usize) {
        match (self, source) {
            (PrimvarData::Float(d), PrimvarData::Float(s)) => d[to] = s[from],
            (PrimvarData::Integer(d), PrimvarData::Integer(s)) => d[to] = s[from],
            (PrimvarData::Point(d), PrimvarData::Point(s))
            | (PrimvarData::Vector(d), PrimvarData::Vector(s))
            | (PrimvarData::Normal(d), PrimvarData::Normal(s))
            | (PrimvarData::Color(d), PrimvarData::Color(s)) => d[to] = s[from],
            (PrimvarData::HPoint(d), PrimvarData::HPoint(s)) => d[to] = s[from],
            (PrimvarData::Matrix(d), PrimvarData::Matrix(s)) => d[to] = s[from],
            (PrimvarData::String(d), PrimvarData::String(s)) => d[to] = s[from].clone(),
            _ => debug_assert!(false, "primvar type mismatch in copy_element"),
        }
    }
}

/// A named primitive variable.
#[derive(Debug, Clone)]
pub struct Primvar {
    /// Name of the variable, e.g. `"P"` or `"st"`.
    pub name: String,
    /// Storage class.
    pub class: PrimvarClass,
    /// Per-entry array length; 1 for scalar entries.
    pub array_len: usize,
    /// The values.
    pub data: PrimvarData,
}

impl Primvar {
    /// An empty primvar of the given shape.
    pub fn new(
        name: impl Into<String>,
        class: PrimvarClass,
        ty: PrimvarType,
        array_len: usize,
    ) -> Self {
        Primvar {
            name: name.into(),
            class,
            array_len: array_len.max(1),
            data: PrimvarData::empty(ty),
        }
    }

    /// A per-vertex point primvar, the usual shape of `"P"`.
    pub fn points(name: impl Into<String>, positions: Vec<Vec3>) -> Self {
        Primvar {
            name: name.into(),
            class: PrimvarClass::Vertex,
            array_len: 1,
            data: PrimvarData::Point(positions),
        }
    }

    /// Value type of the stored data.
    pub fn ty(&self) -> PrimvarType {
        match &self.data {
            PrimvarData::Float(_) => PrimvarType::Float,
            PrimvarData::Integer(_) => PrimvarType::Integer,
            PrimvarData::Point(_) => PrimvarType::Point,
            PrimvarData::Vector(_) => PrimvarType::Vector,
            PrimvarData::Normal(_) => PrimvarType::Normal,
            PrimvarData::HPoint(_) => PrimvarType::HPoint,
            PrimvarData::Color(_) => PrimvarType::Color,
            PrimvarData::Matrix(_) => PrimvarType::Matrix,
            PrimvarData::String(_) => PrimvarType::String,
        }
    }

    /// Number of entries (buffer length divided by the array length).
    pub fn count(&self) -> usize {
        self.data.len() / self.array_len
    }

    /// Grow or shrink to `count` entries.
    pub fn set_count(&mut self, count: usize) {
        self.data.resize(count * self.array_len);
    }
}

/// All primitive variables of one time slot of a mesh.
#[derive(Debug, Clone, Default)]
pub struct PrimvarSet {
    vars: Vec<Primvar>,
}

impl PrimvarSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a variable.  Names are expected to be unique; a repeated
    /// name shadows the earlier entry in lookups.
    pub fn push(&mut self, var: Primvar) {
        self.vars.push(var);
    }

    /// Find a variable by name.
    pub fn find(&self, name: &str) -> Option<&Primvar> {
        self.vars.iter().find(|v| v.name == name)
    }

    /// Find a variable by name, mutably.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut Primvar> {
        self.vars.iter_mut().find(|v| v.name == name)
    }

    /// Iterate over the variables.
    pub fn iter(&self) -> impl Iterator<Item = &Primvar> {
        self.vars.iter()
    }

    /// Iterate over the variables, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Primvar> {
        self.vars.iter_mut()
    }

    /// Number of variables in the set.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// `true` if the set holds no variables.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Check every buffer against its class-implied count.
    pub fn validate(&self, vertices: usize, faces: usize, face_vertices: usize) -> Result<()> {
        for var in &self.vars {
            let expected = match var.class {
                PrimvarClass::Constant => 1,
                PrimvarClass::Uniform => faces,
                PrimvarClass::Varying | PrimvarClass::Vertex => vertices,
                PrimvarClass::FaceVarying | PrimvarClass::FaceVertex => face_vertices,
            };
            if var.count() != expected {
                return Err(Error::InvalidBufferSize {
                    name: var.name.clone(),
                    expected,
                    actual: var.count(),
                });
            }
        }
        Ok(())
    }
}

/// The keyframed point pool of a mesh: one [`PrimvarSet`] per motion
/// time slot.  A static mesh has a single slot at time zero.
#[derive(Debug, Clone)]
pub struct PointPool {
    times: Vec<f32>,
    slots: Vec<PrimvarSet>,
}

impl PointPool {
    /// A pool with a single time slot at time zero.
    pub fn new(slot: PrimvarSet) -> Self {
        PointPool {
            times: vec![0.0],
            slots: vec![slot],
        }
    }

    /// Append a further time slot.  Every slot must carry the same
    /// variables with the same shapes.
    pub fn add_time_slot(&mut self, time: f32, slot: PrimvarSet) {
        self.times.push(time);
        self.slots.push(slot);
    }

    /// Number of time slots.
    pub fn time_count(&self) -> usize {
        self.slots.len()
    }

    /// Shutter time of slot `index`.
    pub fn time(&self, index: usize) -> f32 {
        self.times[index]
    }

    /// The variables of slot `index`.
    pub fn slot(&self, index: usize) -> &PrimvarSet {
        &self.slots[index]
    }

    /// The variables of slot `index`, mutably.
    pub fn slot_mut(&mut self, index: usize) -> &mut PrimvarSet {
        &mut self.slots[index]
    }

    /// Mutable access to every slot at once.
    pub(crate) fn slots_mut(&mut self) -> &mut [PrimvarSet] {
        &mut self.slots
    }
}

/// Element arithmetic shared by the subdivision masks.
///
/// Implemented for the numeric value types; strings and matrices do
/// not take part in averaging.
pub(crate) trait Element: Copy {
    fn zero() -> Self;
    fn add(self, other: Self) -> Self;
    fn scale(self, s: f32) -> Self;
    fn close(self, other: Self) -> bool;
}

/// Relative closeness for the facevertex continuity tests.
#[inline]
pub(crate) fn is_close(a: f32, b: f32) -> bool {
    (a - b).abs() <= 1e-4 * a.abs().max(b.abs()).max(1.0)
}

impl Element for f32 {
    fn zero() -> Self {
        0.0
    }
    fn add(self, other: Self) -> Self {
        self + other
    }
    fn scale(self, s: f32) -> Self {
        self * s
    }
    fn close(self, other: Self) -> bool {
        is_close(self, other)
    }
}

impl Element for i32 {
    fn zero() -> Self {
        0
    }
    fn add(self, other: Self) -> Self {
        self + other
    }
    fn scale(self, s: f32) -> Self {
        (self as f32 * s) as i32
    }
    fn close(self, other: Self) -> bool {
        self == other
    }
}

impl Element for Vec3 {
    fn zero() -> Self {
        Vec3::ZERO
    }
    fn add(self, other: Self) -> Self {
        self + other
    }
    fn scale(self, s: f32) -> Self {
        self * s
    }
    fn close(self, other: Self) -> bool {
        is_close(self.x, other.x) && is_close(self.y, other.y) && is_close(self.z, other.z)
    }
}

impl Element for Vec4 {
    fn zero() -> Self {
        Vec4::ZERO
    }
    fn add(self, other: Self) -> Self {
        self + other
    }
    fn scale(self, s: f32) -> Self {
        self * s
    }
    fn close(self, other: Self) -> bool {
        is_close(self.x, other.x)
            && is_close(self.y, other.y)
            && is_close(self.z, other.z)
            && is_close(self.w, other.w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_counts_validate() {
        let mut set = PrimvarSet::new();
        set.push(Primvar::points("P", vec![Vec3::ZERO; 4]));
        let mut cs = Primvar::new("Cs", PrimvarClass::Uniform, PrimvarType::Color, 1);
        cs.set_count(1);
        set.push(cs);
        assert!(set.validate(4, 1, 4).is_ok());
        assert!(set.validate(5, 1, 4).is_err());
    }

    #[test]
    fn resize_extends_with_defaults() {
        let mut pv = Primvar::new("w", PrimvarClass::Vertex, PrimvarType::Float, 2);
        pv.set_count(3);
        assert_eq!(pv.data.len(), 6);
        assert_eq!(pv.count(), 3);
    }

    #[test]
    fn close_is_relative() {
        assert!(is_close(1000.0, 1000.05));
        assert!(!is_close(0.0, 0.01));
        assert!(is_close(0.0, 0.00005));
    }
}
