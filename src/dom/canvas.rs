//! Elements, `<canvas>`, the 2D context and WebGL.
//!
//! Canvas pixels live in the element's [`Slot::Canvas`]; contexts are host
//! records pointing back at their canvas.

use super::host::{attr, field_attr, illegal, interface, live, op, record, this_object, Host, Interface, Shared};
use super::WindowConfig;
use crate::error::JsError;
use crate::js::{arg, JsObject, JsValue, Property, Slot};
use crate::noise::Rect;
use base64::Engine as _;

pub const UNMASKED_VENDOR_WEBGL: u32 = 37445;
pub const UNMASKED_RENDERER_WEBGL: u32 = 37446;
const VENDOR: u32 = 7936;
const RENDERER: u32 = 7937;
const VERSION: u32 = 7938;

pub(super) struct Elements {
    pub html: Interface,
    pub canvas: Interface,
}

fn number(args: &[JsValue], i: usize) -> f64 {
    arg(args, i).as_f64().unwrap_or(0.0)
}

fn dimension(args: &[JsValue], i: usize) -> Result<u32, JsError> {
    let n = number(args, i);
    if n.is_finite() && n >= 0.0 {
        Ok(n as u32)
    } else {
        Err(JsError::dom("IndexSizeError", "The source width is 0."))
    }
}

/// The canvas a context draws to.
fn canvas_of(context: &JsObject) -> Result<JsObject, JsError> {
    match context.field("canvas") {
        Some(JsValue::Object(canvas)) => Ok(canvas),
        _ => Err(JsError::type_error("Illegal invocation")),
    }
}

fn canvas_size(canvas: &JsObject) -> Result<(u32, u32), JsError> {
    canvas.with_slot_ref(|slot| match slot {
        Some(Slot::Canvas { width, height, .. }) => Ok((*width, *height)),
        _ => Err(JsError::type_error("Illegal invocation")),
    })
}

/// Copy the `w`x`h` region at `(x, y)`; pixels outside the canvas read as
/// transparent black.
fn read_region(canvas: &JsObject, x: i64, y: i64, w: u32, h: u32) -> Result<Vec<u8>, JsError> {
    canvas.with_slot_ref(|slot| match slot {
        Some(Slot::Canvas { width, height, pixels }) => {
            let mut out = vec![0u8; w as usize * h as usize * 4];
            for row in 0..h as i64 {
                for col in 0..w as i64 {
                    let (sx, sy) = (x + col, y + row);
                    if sx < 0 || sy < 0 || sx >= i64::from(*width) || sy >= i64::from(*height) {
                        continue;
                    }
                    let src = ((sy * i64::from(*width) + sx) * 4) as usize;
                    let dst = ((row * i64::from(w) + col) * 4) as usize;
                    out[dst..dst + 4].copy_from_slice(&pixels[src..src + 4]);
                }
            }
            Ok(out)
        }
        _ => Err(JsError::type_error("Illegal invocation")),
    })
}

fn write_region(canvas: &JsObject, x: i64, y: i64, w: u32, h: u32, data: &[u8]) -> Result<(), JsError> {
    canvas.with_slot_mut(|slot| match slot {
        Some(Slot::Canvas { width, height, pixels }) => {
            for row in 0..h as i64 {
                for col in 0..w as i64 {
                    let (dx, dy) = (x + col, y + row);
                    if dx < 0 || dy < 0 || dx >= i64::from(*width) || dy >= i64::from(*height) {
                        continue;
                    }
                    let src = ((row * i64::from(w) + col) * 4) as usize;
                    let dst = ((dy * i64::from(*width) + dx) * 4) as usize;
                    if let Some(px) = data.get(src..src + 4) {
                        pixels[dst..dst + 4].copy_from_slice(px);
                    }
                }
            }
            Ok(())
        }
        _ => Err(JsError::type_error("Illegal invocation")),
    })
}

fn parse_color(style: &str) -> [u8; 4] {
    let hex = style.trim().trim_start_matches('#');
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .unwrap_or(0)
    };
    if hex.len() == 6 {
        [channel(0), channel(2), channel(4), 255]
    } else {
        [0, 0, 0, 255]
    }
}

pub(super) fn canvas_object(proto: &JsObject, width: u32, height: u32) -> JsObject {
    JsObject::with_slot(
        "HTMLCanvasElement",
        Some(proto),
        Slot::Canvas {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        },
    )
}

fn resize(this: &JsObject, new_width: Option<u32>, new_height: Option<u32>) -> Host {
    this.with_slot_mut(|slot| match slot {
        Some(Slot::Canvas { width, height, pixels }) => {
            *width = new_width.unwrap_or(*width);
            *height = new_height.unwrap_or(*height);
            *pixels = vec![0; *width as usize * *height as usize * 4];
            Ok(JsValue::Undefined)
        }
        _ => Err(JsError::type_error("Illegal invocation")),
    })
}

pub(super) fn elements(global: &JsObject, config: &WindowConfig, shared: &Shared) -> Elements {
    let element = interface(global, "Element", None, 0, illegal);
    let html = interface(global, "HTMLElement", Some(&element.proto), 0, illegal);
    let canvas = interface(global, "HTMLCanvasElement", Some(&html.proto), 0, illegal);
    let media = interface(global, "HTMLMediaElement", Some(&html.proto), 0, illegal);

    let s = shared.clone();
    op(&element.proto, "getBoundingClientRect", 0, move |this, _| {
        let this = this_object(this)?;
        let rect = this.with_slot_ref(|slot| match slot {
            Some(Slot::Element { rect, .. }) => Ok(*rect),
            Some(Slot::Canvas { width, height, .. }) => {
                Ok(Rect::new(0.0, 0.0, f64::from(*width), f64::from(*height)))
            }
            _ => Err(JsError::type_error("Illegal invocation")),
        })?;
        s.rect(rect)
    });
    attr(&element.proto, "tagName", |this| {
        this.with_slot_ref(|slot| match slot {
            Some(Slot::Element { tag, .. }) => Ok(tag.to_uppercase().into()),
            Some(Slot::Canvas { .. }) => Ok("CANVAS".into()),
            _ => Err(JsError::type_error("Illegal invocation")),
        })
    });

    for key in ["width", "height"] {
        let get = JsObject::native_function(&format!("get {}", key), 0, move |this, _| {
            let (w, h) = canvas_size(this_object(this)?)?;
            Ok(if key == "width" { w } else { h }.into())
        });
        let set = JsObject::native_function(&format!("set {}", key), 1, move |this, args| {
            let value = dimension(args, 0)?;
            let this = this_object(this)?;
            if key == "width" {
                resize(this, Some(value), None)
            } else {
                resize(this, None, Some(value))
            }
        });
        canvas.proto.insert(
            key,
            Property::Accessor {
                get: Some(get),
                set: Some(set),
                enumerable: true,
                configurable: true,
            },
        );
    }

    let context_2d = context_2d(global, shared);
    let (webgl, webgl2) = webgl(global, config);
    let protos = [
        context_2d.downgrade(),
        webgl.downgrade(),
        webgl2.downgrade(),
    ];
    op(&canvas.proto, "getContext", 1, move |this, args| {
        let this = this_object(this)?;
        canvas_size(this)?;
        let (class, proto) = match arg(args, 0).as_str() {
            Some("2d") => ("CanvasRenderingContext2D", &protos[0]),
            Some("webgl") | Some("experimental-webgl") => ("WebGLRenderingContext", &protos[1]),
            Some("webgl2") => ("WebGL2RenderingContext", &protos[2]),
            _ => return Ok(JsValue::Null),
        };
        Ok(record(
            class,
            &live(proto)?,
            vec![
                ("canvas", this.clone().into()),
                ("fillStyle", "#000000".into()),
            ],
        )
        .into())
    });
    op(&canvas.proto, "toDataURL", 0, |this, _| {
        let this = this_object(this)?;
        this.with_slot_ref(|slot| match slot {
            Some(Slot::Canvas { width: 0, .. }) | Some(Slot::Canvas { height: 0, .. }) => {
                Ok("data:,".into())
            }
            Some(Slot::Canvas { pixels, .. }) => Ok(format!(
                "data:image/png;base64,{}",
                base64::engine::general_purpose::STANDARD.encode(pixels)
            )
            .into()),
            _ => Err(JsError::type_error("Illegal invocation")),
        })
    });
    op(&canvas.proto, "toBlob", 1, |this, args| {
        let this = this_object(this)?;
        let bytes = this.with_slot_ref(|slot| match slot {
            Some(Slot::Canvas { pixels, .. }) => Ok(pixels.clone()),
            _ => Err(JsError::type_error("Illegal invocation")),
        })?;
        let blob = JsObject::with_slot("Blob", None, Slot::Uint8(bytes.clone()));
        blob.insert("size", Property::hidden(bytes.len() as f64));
        blob.insert("type", Property::hidden("image/png"));
        crate::js::call(&arg(args, 0), &JsValue::Undefined, &[blob.into()])?;
        Ok(JsValue::Undefined)
    });

    let chromium = config.chromium;
    op(&media.proto, "canPlayType", 1, move |_, args| {
        let kind = arg(args, 0).to_display();
        let answer = if kind.contains("webm") || kind.contains("ogg") {
            "probably"
        } else if kind.contains("mp4") || kind.contains("avc1") {
            // Open-source Chromium builds ship without proprietary codecs.
            if chromium { "" } else { "maybe" }
        } else {
            ""
        };
        Ok(answer.into())
    });

    Elements { html, canvas }
}

fn context_2d(global: &JsObject, shared: &Shared) -> JsObject {
    let iface = interface(global, "CanvasRenderingContext2D", None, 0, illegal);
    let proto = iface.proto;

    field_attr(&proto, "canvas");
    let get = JsObject::native_function("get fillStyle", 0, |this, _| {
        Ok(this_object(this)?.field("fillStyle").unwrap_or_default())
    });
    let set = JsObject::native_function("set fillStyle", 1, |this, args| {
        this_object(this)?.with_slot_mut(|slot| {
            if let Some(Slot::Fields(fields)) = slot {
                fields.insert("fillStyle".to_string(), arg(args, 0).to_display().into());
            }
        });
        Ok(JsValue::Undefined)
    });
    proto.insert(
        "fillStyle",
        Property::Accessor {
            get: Some(get),
            set: Some(set),
            enumerable: true,
            configurable: true,
        },
    );

    op(&proto, "fillRect", 4, |this, args| {
        let this = this_object(this)?;
        let canvas = canvas_of(this)?;
        let color = parse_color(&this.field("fillStyle").unwrap_or_default().to_display());
        let (w, h) = (number(args, 2).max(0.0) as u32, number(args, 3).max(0.0) as u32);
        let data: Vec<u8> = (0..w as usize * h as usize).flat_map(|_| color).collect();
        write_region(&canvas, number(args, 0) as i64, number(args, 1) as i64, w, h, &data)?;
        Ok(JsValue::Undefined)
    });
    let s = shared.clone();
    op(&proto, "getImageData", 4, move |this, args| {
        let canvas = canvas_of(this_object(this)?)?;
        let (w, h) = (dimension(args, 2)?, dimension(args, 3)?);
        if w == 0 || h == 0 {
            return Err(JsError::dom("IndexSizeError", "The source width is 0."));
        }
        let data = read_region(&canvas, number(args, 0) as i64, number(args, 1) as i64, w, h)?;
        s.image_data(w, h, data)
    });
    op(&proto, "putImageData", 3, |this, args| {
        let canvas = canvas_of(this_object(this)?)?;
        let image = arg(args, 0);
        let image = image
            .as_object()
            .ok_or_else(|| JsError::type_error("parameter 1 is not of type 'ImageData'"))?;
        let dim = |key| image.field(key).and_then(|v| v.as_f64()).unwrap_or(0.0) as u32;
        let (w, h) = (dim("width"), dim("height"));
        let data = match image.field("data") {
            Some(JsValue::Object(data)) => data.with_slot_ref(|slot| match slot {
                Some(Slot::Uint8Clamped(bytes)) => bytes.clone(),
                _ => Vec::new(),
            }),
            _ => Vec::new(),
        };
        write_region(&canvas, number(args, 1) as i64, number(args, 2) as i64, w, h, &data)?;
        Ok(JsValue::Undefined)
    });
    op(&proto, "drawImage", 3, |this, args| {
        let canvas = canvas_of(this_object(this)?)?;
        let source = arg(args, 0);
        let source = source
            .as_object()
            .ok_or_else(|| JsError::type_error("parameter 1 is not a CanvasImageSource"))?;
        let (w, h) = canvas_size(source)?;
        let data = read_region(source, 0, 0, w, h)?;
        write_region(&canvas, number(args, 1) as i64, number(args, 2) as i64, w, h, &data)?;
        Ok(JsValue::Undefined)
    });

    proto
}

/// `WebGLRenderingContext` and `WebGL2RenderingContext` prototypes.
fn webgl(global: &JsObject, config: &WindowConfig) -> (JsObject, JsObject) {
    let build = |name: &str, version: &'static str| {
        let iface = interface(global, name, None, 0, illegal);
        let vendor = config.webgl_vendor.clone();
        let renderer = config.webgl_renderer.clone();
        op(&iface.proto, "getParameter", 1, move |_, args| {
            let value = match arg(args, 0).as_f64().map(|n| n as u32) {
                Some(UNMASKED_VENDOR_WEBGL) => vendor.as_str().into(),
                Some(UNMASKED_RENDERER_WEBGL) => renderer.as_str().into(),
                Some(VENDOR) => "WebKit".into(),
                Some(RENDERER) => "WebKit WebGL".into(),
                Some(VERSION) => version.into(),
                _ => JsValue::Null,
            };
            Ok(value)
        });
        op(&iface.proto, "readPixels", 7, |this, args| {
            let canvas = canvas_of(this_object(this)?)?;
            let (w, h) = (dimension(args, 2)?, dimension(args, 3)?);
            let data = read_region(&canvas, number(args, 0) as i64, number(args, 1) as i64, w, h)?;
            let target = arg(args, 6);
            let target = target
                .as_object()
                .ok_or_else(|| JsError::type_error("parameter 7 is not of type 'ArrayBufferView'"))?;
            target.with_slot_mut(|slot| match slot {
                Some(Slot::Uint8(bytes)) | Some(Slot::Uint8Clamped(bytes)) => {
                    let n = bytes.len().min(data.len());
                    bytes[..n].copy_from_slice(&data[..n]);
                    Ok(JsValue::Undefined)
                }
                _ => Err(JsError::type_error("parameter 7 is not of type 'ArrayBufferView'")),
            })
        });
        iface.proto
    };
    (
        build("WebGLRenderingContext", "WebGL 1.0 (OpenGL ES 2.0 Chromium)"),
        build("WebGL2RenderingContext", "WebGL 2.0 (OpenGL ES 3.0 Chromium)"),
    )
}
