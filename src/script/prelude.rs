//! Page-side helpers shared by the override blocks.
//!
//! [`CORE`] is the JavaScript counterpart of [`native`](crate::native) and
//! [`guard`](crate::guard): `make`/`wrap` build functions whose `name`,
//! `length` and `toString` match an engine built-in, and `protect` installs
//! them on prototypes. `Function.prototype.toString` is itself replaced by a
//! native-looking function that answers from a `WeakMap`, so wrapped
//! functions can be collected with their page.
//!
//! The noise helpers use the formulas of [`noise`](crate::noise), including
//! the explicit `clamp8` for every byte buffer.
//!
//! Helper sources must not contain `//` comments: the compact renderer joins
//! lines.

/// A named chunk of prelude source. Emitted at most once per script, in
/// declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Helper {
    Core,
    Noise,
    Chromium,
    UaData,
    Canvas,
    Audio,
    Rects,
    WebGl,
    Timezone,
    Geolocation,
    WebRtc,
}

impl Helper {
    /// Helpers this one calls.
    pub fn requires(self) -> &'static [Helper] {
        match self {
            Helper::Core => &[],
            Helper::Noise => &[Helper::Core],
            Helper::Canvas | Helper::Audio | Helper::Rects | Helper::WebGl => {
                &[Helper::Core, Helper::Noise]
            }
            _ => &[Helper::Core],
        }
    }

    pub fn source(self) -> &'static str {
        match self {
            Helper::Core => CORE,
            Helper::Noise => NOISE,
            Helper::Chromium => CHROMIUM,
            Helper::UaData => UA_DATA,
            Helper::Canvas => CANVAS,
            Helper::Audio => AUDIO,
            Helper::Rects => RECTS,
            Helper::WebGl => WEBGL,
            Helper::Timezone => TIMEZONE,
            Helper::Geolocation => GEOLOCATION,
            Helper::WebRtc => WEBRTC,
        }
    }
}

pub const CORE: &str = r#"
const g = globalThis;
const define = Object.defineProperty;
const describe = Object.getOwnPropertyDescriptor;
const sources = new WeakMap();
const originals = new WeakMap();
const hidden = (value) => ({ value: value, writable: false, enumerable: false, configurable: true });
const make = (name, length, impl) => {
  const f = { [name](...args) { return impl(this, args); } }[name];
  define(f, 'length', hidden(length));
  define(f, 'name', hidden(name));
  sources.set(f, 'function ' + name + '() { [native code] }');
  return f;
};
const wrap = (original, wrapper, name, length) => {
  if (typeof original !== 'function') throw new TypeError('original is not a function');
  if (typeof wrapper !== 'function') throw new TypeError('wrapper is not a function');
  const f = make(name === undefined ? original.name : name, length === undefined ? original.length : length, (self, args) => wrapper(original, args, self));
  originals.set(f, original);
  return f;
};
const protect = (target, key, f, asGetter) => {
  const d = describe(target, key);
  if (d && (d.get || d.set)) define(target, key, { get: f, set: d.set, enumerable: d.enumerable, configurable: d.configurable });
  else if (d) define(target, key, { value: f, writable: d.writable, enumerable: d.enumerable, configurable: d.configurable });
  else if (asGetter) define(target, key, { get: f, set: undefined, enumerable: true, configurable: true });
  else define(target, key, { value: f, writable: true, enumerable: true, configurable: true });
};
const wrapGetter = (target, key, impl) => {
  const d = describe(target, key);
  const name = 'get ' + key;
  const f = d && d.get ? wrap(d.get, (original, args, self) => impl(self, original), name, 0) : make(name, 0, (self) => impl(self, undefined));
  protect(target, key, f, true);
};
const getter = (target, key, value) => wrapGetter(target, key, (self, original) => {
  if (original) original.call(self);
  else if (target !== g && !(self !== null && (typeof self === 'object' || typeof self === 'function') && Object.prototype.isPrototypeOf.call(target, self))) throw new TypeError('Illegal invocation');
  return value;
});
const method = (target, key, impl) => {
  const original = target[key];
  if (typeof original !== 'function') throw new TypeError(key + ' is not a function');
  protect(target, key, wrap(original, impl));
};
const remove = (target, key) => {
  if (key in target) delete target[key];
};
const proto = (name) => {
  const ctor = g[name];
  if (typeof ctor !== 'function') throw new ReferenceError(name + ' is not defined');
  return ctor.prototype;
};
const fnToString = Function.prototype.toString;
protect(Function.prototype, 'toString', make('toString', 0, (self) => sources.has(self) ? sources.get(self) : fnToString.call(self)));
"#;

pub const NOISE: &str = r#"
const pixelNoise = (seed, i) => (Math.sin(seed + i) * 127 + 128) % 2;
const clamp8 = (v) => {
  if (!(v > 0)) return 0;
  if (v >= 255) return 255;
  const f = Math.floor(v);
  const r = v - f;
  return r < 0.5 ? f : r > 0.5 ? f + 1 : f % 2 === 0 ? f : f + 1;
};
const noisePixels = (data, seed, scale) => {
  for (let p = 0; p * 4 < data.length; p++) {
    const n = pixelNoise(seed, p) * scale;
    for (let c = p * 4; c < p * 4 + 3 && c < data.length; c++) data[c] = clamp8(data[c] + n);
  }
  return data;
};
const noiseSamples = (data, seed, scale) => {
  for (let i = 0; i < data.length; i++) {
    const v = data[i] + pixelNoise(seed, i) * scale;
    data[i] = v < -1 ? -1 : v > 1 ? 1 : v;
  }
  return data;
};
"#;

pub const CHROMIUM: &str = r#"
const chromium = () => {
  if (!g.chrome) define(g, 'chrome', { value: { app: { isInstalled: false }, runtime: {} }, writable: true, enumerable: true, configurable: false });
  const media = g.HTMLMediaElement && g.HTMLMediaElement.prototype;
  if (media) method(media, 'canPlayType', (original, args, self) => {
    const type = String(args[0]);
    if (type.includes('avc1') || type.includes('mp4a.40') || type === 'video/mp4' || type === 'audio/mp4') return 'probably';
    return original.apply(self, args);
  });
};
"#;

pub const UA_DATA: &str = r#"
const uaData = (brands, platform, high) => {
  const target = proto('NavigatorUAData');
  const list = Object.freeze(brands.map((b) => Object.freeze({ brand: b[0], version: b[1] })));
  getter(target, 'brands', list);
  getter(target, 'mobile', false);
  getter(target, 'platform', platform);
  method(target, 'getHighEntropyValues', (original, args, self) => original.apply(self, args).then((values) => {
    const hints = Array.isArray(args[0]) ? args[0] : [];
    values.brands = list;
    values.mobile = false;
    values.platform = platform;
    for (const key of Object.keys(high)) if (hints.includes(key)) values[key] = high[key];
    return values;
  }));
};
"#;

pub const CANVAS: &str = r#"
const noiseCanvas = (seed, scale) => {
  const context = proto('CanvasRenderingContext2D');
  const canvas = proto('HTMLCanvasElement');
  const getImageData = context.getImageData;
  const noisyCopy = (source) => {
    if (!source.width || !source.height) return source;
    const copy = document.createElement('canvas');
    copy.width = source.width;
    copy.height = source.height;
    const ctx = copy.getContext('2d');
    ctx.drawImage(source, 0, 0);
    const image = getImageData.call(ctx, 0, 0, copy.width, copy.height);
    noisePixels(image.data, seed, scale);
    ctx.putImageData(image, 0, 0);
    return copy;
  };
  method(context, 'getImageData', (original, args, self) => {
    const image = original.apply(self, args);
    noisePixels(image.data, seed, scale);
    return image;
  });
  method(canvas, 'toDataURL', (original, args, self) => original.apply(noisyCopy(self), args));
  method(canvas, 'toBlob', (original, args, self) => original.apply(noisyCopy(self), args));
};
"#;

pub const AUDIO: &str = r#"
const noiseAudio = (seed, scale) => {
  const buffer = proto('AudioBuffer');
  const done = new WeakSet();
  method(buffer, 'getChannelData', (original, args, self) => {
    const data = original.apply(self, args);
    if (!done.has(data)) {
      done.add(data);
      noiseSamples(data, seed, scale);
    }
    return data;
  });
  if (typeof buffer.copyFromChannel === 'function') method(buffer, 'copyFromChannel', (original, args, self) => {
    self.getChannelData(args[1]);
    return original.apply(self, args);
  });
};
"#;

pub const RECTS: &str = r#"
const noiseRects = (seed, scale) => {
  const jitter = (rect) => {
    const w = Math.round(Math.min(Math.max(rect.width, 0), 65535));
    const h = Math.round(Math.min(Math.max(rect.height, 0), 65535));
    const n = pixelNoise(seed, w * 31 + h) * scale;
    return new DOMRect(rect.x, rect.y, rect.width + n, rect.height + n);
  };
  method(proto('Element'), 'getBoundingClientRect', (original, args, self) => jitter(original.apply(self, args)));
};
"#;

pub const WEBGL: &str = r#"
const spoofWebgl = (vendor, renderer, seed, scale) => {
  let patched = 0;
  for (const name of ['WebGLRenderingContext', 'WebGL2RenderingContext']) {
    if (typeof g[name] !== 'function') continue;
    const target = g[name].prototype;
    method(target, 'getParameter', (original, args, self) => args[0] === 37445 ? vendor : args[0] === 37446 ? renderer : original.apply(self, args));
    method(target, 'readPixels', (original, args, self) => {
      const result = original.apply(self, args);
      const pixels = args[6];
      if (pixels && pixels.BYTES_PER_ELEMENT === 1) noisePixels(pixels, seed, scale);
      return result;
    });
    patched++;
  }
  if (!patched) throw new ReferenceError('WebGLRenderingContext is not defined');
};
"#;

pub const TIMEZONE: &str = r#"
const spoofZone = (zone) => {
  const DateTimeFormat = Intl.DateTimeFormat;
  const systemZone = new DateTimeFormat().resolvedOptions().timeZone;
  const formatter = new DateTimeFormat('en-US', { timeZone: zone, hourCycle: 'h23', year: 'numeric', month: 'numeric', day: 'numeric', hour: 'numeric', minute: 'numeric', second: 'numeric' });
  const getTime = Date.prototype.getTime;
  const offset = (time) => {
    if (time !== time) return NaN;
    const parts = {};
    for (const part of formatter.formatToParts(time)) parts[part.type] = part.value;
    const local = Date.UTC(+parts.year, +parts.month - 1, +parts.day, +parts.hour, +parts.minute, +parts.second);
    return Math.round((Math.floor(time / 1000) * 1000 - local) / 60000);
  };
  method(Date.prototype, 'getTimezoneOffset', (original, args, self) => offset(getTime.call(self)));
  method(DateTimeFormat.prototype, 'resolvedOptions', (original, args, self) => {
    const options = original.apply(self, args);
    if (options.timeZone === systemZone) options.timeZone = zone;
    return options;
  });
};
"#;

pub const GEOLOCATION: &str = r#"
const spoofGeo = (position) => {
  const target = proto('Geolocation');
  const later = (f, value) => {
    if (typeof f === 'function') setTimeout(() => f(value), 0);
  };
  const denied = { code: 1, message: 'User denied Geolocation', PERMISSION_DENIED: 1, POSITION_UNAVAILABLE: 2, TIMEOUT: 3 };
  const answer = (args) => position ? later(args[0], { coords: Object.assign({ altitude: null, altitudeAccuracy: null, heading: null, speed: null }, position), timestamp: Date.now() }) : later(args[1], denied);
  method(target, 'getCurrentPosition', (original, args) => {
    answer(args);
  });
  method(target, 'watchPosition', (original, args) => {
    answer(args);
    return 1;
  });
};
"#;

pub const WEBRTC: &str = r#"
const replaceRtc = (ip, pattern) => {
  const mask = (text) => typeof text === 'string' ? text.replace(new RegExp(pattern, 'gi'), ip) : text;
  const candidate = proto('RTCIceCandidate');
  wrapGetter(candidate, 'candidate', (self, original) => mask(original.call(self)));
  wrapGetter(candidate, 'address', (self, original) => mask(original.call(self)));
  wrapGetter(proto('RTCPeerConnection'), 'localDescription', (self, original) => {
    const description = original.call(self);
    return description && new RTCSessionDescription({ type: description.type, sdp: mask(description.sdp) });
  });
};
"#;

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Helper; 11] = [
        Helper::Core,
        Helper::Noise,
        Helper::Chromium,
        Helper::UaData,
        Helper::Canvas,
        Helper::Audio,
        Helper::Rects,
        Helper::WebGl,
        Helper::Timezone,
        Helper::Geolocation,
        Helper::WebRtc,
    ];

    #[test]
    fn test_helpers_have_no_line_comments() {
        for helper in ALL {
            for line in helper.source().lines() {
                assert!(!line.trim_start().starts_with("//"), "{:?}: {}", helper, line);
            }
        }
    }

    #[test]
    fn test_requirements_come_first() {
        for helper in ALL {
            for dep in helper.requires() {
                assert!(*dep < helper, "{:?} requires later {:?}", helper, dep);
            }
        }
    }

    #[test]
    fn test_core_mimics_native_shape() {
        assert!(CORE.contains("'function ' + name + '() { [native code] }'"));
        assert!(CORE.contains("writable: false, enumerable: false, configurable: true"));
        assert!(CORE.contains("new WeakMap()"));
    }
}
