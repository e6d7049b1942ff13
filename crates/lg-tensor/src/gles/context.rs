use std::rc::Rc;

use khronos_egl as egl;

use crate::error::{Result, TensorError};

/// A headless EGL display, config, context, and 1x1 pbuffer surface, current
/// on this thread for the process lifetime. All kernel compilation, buffer
/// creation, and dispatch must happen between `acquire()` and `release()` on
/// the same thread (see ยง4.1 / ยง5).
pub struct GlesContext {
    egl: egl::Instance<egl::Static>,
    display: egl::Display,
    surface: egl::Surface,
    context: egl::Context,
    gl: Rc<glow::Context>,
}

impl GlesContext {
    pub fn acquire() -> Result<Self> {
        let egl = egl::Instance::new(egl::Static);

        let display = unsafe { egl.get_display(egl::DEFAULT_DISPLAY) }
            .ok_or_else(|| TensorError::Context("no default EGL display".to_string()))?;
        egl.initialize(display).map_err(|e| TensorError::Context(e.to_string()))?;

        let config_attribs = [
            egl::SURFACE_TYPE,
            egl::PBUFFER_BIT,
            egl::RENDERABLE_TYPE,
            egl::OPENGL_ES3_BIT,
            egl::NONE,
        ];
        let config = egl
            .choose_first_config(display, &config_attribs)
            .map_err(|e| TensorError::Context(e.to_string()))?
            .ok_or_else(|| TensorError::Context("no EGL config supports GLES3 compute".to_string()))?;

        egl.bind_api(egl::OPENGL_ES_API).map_err(|e| TensorError::Context(e.to_string()))?;

        let context_attribs = [egl::CONTEXT_CLIENT_VERSION, 3, egl::NONE];
        let context = egl
            .create_context(display, config, None, &context_attribs)
            .map_err(|e| TensorError::Context(e.to_string()))?;

        let pbuffer_attribs = [egl::WIDTH, 1, egl::HEIGHT, 1, egl::NONE];
        let surface = egl
            .create_pbuffer_surface(display, config, &pbuffer_attribs)
            .map_err(|e| TensorError::Context(e.to_string()))?;

        egl.make_current(display, Some(surface), Some(surface), Some(context))
            .map_err(|e| TensorError::Context(e.to_string()))?;

        let gl = unsafe {
            glow::Context::from_loader_function(|name| {
                egl.get_proc_address(name).map(|p| p as *const _).unwrap_or(std::ptr::null())
            })
        };

        Ok(GlesContext {
            egl,
            display,
            surface,
            context,
            gl: Rc::new(gl),
        })
    }

    pub fn gl(&self) -> Rc<glow::Context> {
        self.gl.clone()
    }
}

impl Drop for GlesContext {
    fn drop(&mut self) {
        let _ = self.egl.make_current(self.display, None, None, None);
        let _ = self.egl.destroy_surface(self.display, self.surface);
        let _ = self.egl.destroy_context(self.display, self.context);
        let _ = self.egl.terminate(self.display);
    }
}
