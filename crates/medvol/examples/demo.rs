//! Demo application showing basic medvol-rs usage.
//!
//! This demo builds a synthetic CT phantom (a water cylinder with two bone
//! rods) and renders it with every ray-marching mode into PNG files.

use medvol::*;

fn phantom(resolution: UVec3) -> impl FnMut(UVec3) -> f32 {
    let center = resolution.as_vec3() / 2.0;
    let radius = center.x.min(center.y) * 0.9;
    move |c: UVec3| {
        let p = c.as_vec3() - center;
        let r = p.truncate().length();
        let rod_a = (p.truncate() - Vec2::new(radius * 0.4, 0.0)).length();
        let rod_b = (p.truncate() + Vec2::new(radius * 0.4, 0.0)).length();
        let huv = if rod_a < radius * 0.15 || rod_b < radius * 0.1 {
            Huv::new(1500)
        } else if r < radius {
            Huv::new(40)
        } else {
            Huv::MIN
        };
        huv.to_intensity()
    }
}

fn main() -> RenderResult<()> {
    init();

    let resolution = UVec3::new(96, 96, 64);
    let spacing = Vec3::new(0.8, 0.8, 1.2);

    let mut options = Options::default();
    options.dvr = DvrConfig::new().with_translucence(20.0);
    options.mask = MaskConfig::new()
        .with_threshold(Huv::new(400).to_intensity())
        .with_filling(false);

    for (mode, filename) in [
        (RenderMode::Dvr, "demo_dvr.png"),
        (RenderMode::Mip, "demo_mip.png"),
        (RenderMode::Drr, "demo_drr.png"),
        (RenderMode::Mask, "demo_mask.png"),
    ] {
        let source = VolumeSource::new(resolution, spacing, phantom(resolution));
        render_to_file::<u16, _>(filename, source, mode, &options, 512, 512)?;
        println!("Rendered {mode:?} to {filename}");
    }

    Ok(())
}
