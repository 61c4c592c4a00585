use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use lumira_core::{CoreResult, PixelBuffer, RectI};

use crate::alternatives::AlternativesRegistry;
use crate::resource::{ConvertError, ConvertFrom, Resource, ResourceData};

/// Tag used to request a specific concrete surface representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceToken {
    /// Densely packed software pixel buffer.
    Software,
    /// RLE-compressed buffer, cheaper to keep resident, decoded on read.
    Packed,
}

impl fmt::Display for SurfaceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceToken::Software => write!(f, "software"),
            SurfaceToken::Packed => write!(f, "packed"),
        }
    }
}

/// Common view over every concrete surface representation.
pub trait Surface: Send + Sync {
    /// Never blocks.
    fn width(&self) -> u32;
    /// Never blocks.
    fn height(&self) -> u32;
    /// Never blocks. A blank surface has no addressable pixel storage.
    fn is_blank(&self) -> bool;
    fn token(&self) -> SurfaceToken;
    /// Copy (or decode) the pixel content. `None` when blank.
    fn read_pixels(&self) -> Option<PixelBuffer>;
}

/// A surface backed by an uncompressed RGBA8 buffer.
///
/// Created blank; transitions to non-blank exactly once, when pixel
/// storage is committed by the first write lock. Width and height are
/// fixed for the lifetime of the storage.
pub struct SoftwareSurface {
    width: u32,
    height: u32,
    blank: AtomicBool,
    pixels: RwLock<Option<PixelBuffer>>,
}

impl fmt::Debug for SoftwareSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareSurface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("blank", &self.is_blank())
            .finish()
    }
}

impl SoftwareSurface {
    /// A blank surface with no pixel storage yet.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            blank: AtomicBool::new(true),
            pixels: RwLock::new(None),
        }
    }

    /// A non-blank surface wrapping existing pixels.
    pub fn from_pixels(pixels: PixelBuffer) -> Self {
        Self {
            width: pixels.width(),
            height: pixels.height(),
            blank: AtomicBool::new(false),
            pixels: RwLock::new(Some(pixels)),
        }
    }

    pub fn bounds(&self) -> RectI {
        RectI::from_size(self.width, self.height)
    }

    /// Shared read access to the pixel storage. Blocks while a writer
    /// holds the lock; multiple readers proceed concurrently. `None`
    /// when the surface is blank.
    pub fn lock_read(&self) -> Option<MappedRwLockReadGuard<'_, PixelBuffer>> {
        let guard = self.pixels.read();
        RwLockReadGuard::try_map(guard, |p| p.as_ref()).ok()
    }

    /// Exclusive write access, committing zeroed storage first if the
    /// surface is still blank. Fails only on allocation (budget or
    /// overflow), which the caller treats as request-level exhaustion.
    pub fn lock_write(
        &self,
        budget: Option<usize>,
    ) -> CoreResult<MappedRwLockWriteGuard<'_, PixelBuffer>> {
        let mut guard = self.pixels.write();
        if guard.is_none() {
            *guard = Some(PixelBuffer::try_new(self.width, self.height, budget)?);
            self.blank.store(false, Ordering::Release);
        }
        // Storage was committed above, so the map cannot miss.
        Ok(RwLockWriteGuard::map(guard, |p| {
            p.as_mut().expect("pixel storage committed under this write lock")
        }))
    }
}

impl Surface for SoftwareSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn is_blank(&self) -> bool {
        self.blank.load(Ordering::Acquire)
    }

    fn token(&self) -> SurfaceToken {
        SurfaceToken::Software
    }

    fn read_pixels(&self) -> Option<PixelBuffer> {
        self.lock_read().map(|g| g.clone())
    }
}

impl ResourceData for SoftwareSurface {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_surface(&self) -> Option<&dyn Surface> {
        Some(self)
    }
}

impl ConvertFrom for SoftwareSurface {
    fn convert_from(source: &Resource) -> Result<Self, ConvertError> {
        let surface = source
            .data()
            .as_surface()
            .ok_or_else(|| ConvertError::UnsupportedSource(type_name_of(source)))?;
        let pixels = surface
            .read_pixels()
            .ok_or(ConvertError::BlankSource(source.id()))?;
        Ok(SoftwareSurface::from_pixels(pixels))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    count: u32,
    rgba: [u8; 4],
}

/// RLE-compressed surface representation.
///
/// Immutable once built; decoding produces a fresh buffer, so readers
/// never contend. Animation frames are dominated by flat fills, which is
/// what makes the run-length trade worthwhile.
#[derive(Debug, Clone)]
pub struct PackedSurface {
    width: u32,
    height: u32,
    runs: Vec<Run>,
}

impl PackedSurface {
    pub fn encode(pixels: &PixelBuffer) -> Self {
        let mut runs: Vec<Run> = Vec::new();
        for px in pixels.data().chunks_exact(4) {
            let rgba = [px[0], px[1], px[2], px[3]];
            match runs.last_mut() {
                Some(run) if run.rgba == rgba => run.count += 1,
                _ => runs.push(Run { count: 1, rgba }),
            }
        }
        Self { width: pixels.width(), height: pixels.height(), runs }
    }

    pub fn decode(&self) -> CoreResult<PixelBuffer> {
        let mut out = PixelBuffer::try_new(self.width, self.height, None)?;
        let mut i = 0usize;
        let w = self.width as usize;
        for run in &self.runs {
            for _ in 0..run.count {
                out.set_pixel((i % w) as u32, (i / w) as u32, run.rgba);
                i += 1;
            }
        }
        Ok(out)
    }

    /// Number of runs, diagnostic for compression ratio.
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }
}

impl Surface for PackedSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn is_blank(&self) -> bool {
        false
    }

    fn token(&self) -> SurfaceToken {
        SurfaceToken::Packed
    }

    fn read_pixels(&self) -> Option<PixelBuffer> {
        self.decode().ok()
    }
}

impl ResourceData for PackedSurface {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_surface(&self) -> Option<&dyn Surface> {
        Some(self)
    }
}

impl ConvertFrom for PackedSurface {
    fn convert_from(source: &Resource) -> Result<Self, ConvertError> {
        let surface = source
            .data()
            .as_surface()
            .ok_or_else(|| ConvertError::UnsupportedSource(type_name_of(source)))?;
        let pixels = surface
            .read_pixels()
            .ok_or(ConvertError::BlankSource(source.id()))?;
        Ok(PackedSurface::encode(&pixels))
    }
}

fn type_name_of(res: &Resource) -> &'static str {
    // Useful enough for the error message; the concrete set is closed.
    if res.is::<SoftwareSurface>() {
        "SoftwareSurface"
    } else if res.is::<PackedSurface>() {
        "PackedSurface"
    } else {
        "non-surface resource"
    }
}

/// Typed handle to a resource whose representation is a surface.
#[derive(Debug, Clone)]
pub struct SurfaceResource {
    res: Resource,
}

impl SurfaceResource {
    /// Allocate a fresh blank software surface resource.
    pub fn new_software(registry: &Arc<AlternativesRegistry>, width: u32, height: u32) -> Self {
        Self { res: Resource::new(registry, SoftwareSurface::new(width, height)) }
    }

    /// Wrap already-rendered pixels as a non-blank software surface.
    pub fn from_pixels(registry: &Arc<AlternativesRegistry>, pixels: PixelBuffer) -> Self {
        Self { res: Resource::new(registry, SoftwareSurface::from_pixels(pixels)) }
    }

    /// View a generic resource as a surface, if its representation is one.
    pub fn from_resource(res: Resource) -> Option<Self> {
        if res.data().as_surface().is_some() {
            Some(Self { res })
        } else {
            None
        }
    }

    pub fn resource(&self) -> &Resource {
        &self.res
    }

    pub fn surface(&self) -> &dyn Surface {
        // Invariant: only constructed around surface representations.
        self.res
            .data()
            .as_surface()
            .expect("SurfaceResource wraps a surface representation")
    }

    pub fn width(&self) -> u32 {
        self.surface().width()
    }

    pub fn height(&self) -> u32 {
        self.surface().height()
    }

    pub fn bounds(&self) -> RectI {
        RectI::from_size(self.width(), self.height())
    }

    pub fn is_blank(&self) -> bool {
        self.surface().is_blank()
    }

    pub fn token(&self) -> SurfaceToken {
        self.surface().token()
    }

    /// The software representation, when this handle already wraps one.
    pub fn software(&self) -> Option<&SoftwareSurface> {
        self.res.downcast::<SoftwareSurface>()
    }

    /// Obtain a representation compatible with `token`.
    ///
    /// `allow_reuse` permits returning an existing alternative;
    /// `allow_create` permits constructing one through the alternatives
    /// cache. Returns `None` — "nothing to render/read" — when the
    /// surface is blank or no path to the representation is allowed.
    pub fn convert(
        &self,
        token: SurfaceToken,
        allow_create: bool,
        allow_reuse: bool,
    ) -> Option<SurfaceResource> {
        if self.is_blank() {
            return None;
        }
        if self.token() == token {
            return Some(self.clone());
        }
        if allow_reuse {
            let found = match token {
                SurfaceToken::Software => self.res.find_alternative::<SoftwareSurface>(),
                SurfaceToken::Packed => self.res.find_alternative::<PackedSurface>(),
            };
            if let Some(found) = found {
                return SurfaceResource::from_resource(found);
            }
        }
        if allow_create {
            let created = match token {
                SurfaceToken::Software => self.res.get_alternative::<SoftwareSurface>(),
                SurfaceToken::Packed => self.res.get_alternative::<PackedSurface>(),
            };
            match created {
                Ok(created) => return SurfaceResource::from_resource(created),
                Err(err) => {
                    tracing::debug!("conversion of {} to {} failed: {}", self.res.id(), token, err);
                    return None;
                }
            }
        }
        None
    }
}
