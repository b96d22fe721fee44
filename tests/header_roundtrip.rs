//! Main-header write/read round trips through the public API.

use htj2k_core::params::{
    CoefficientType, Comment, DfsRecord, DwtType, Kernel, LiftingStep, NonlinearityType, Point,
    Size, nlt::ALL_COMPS,
};
use htj2k_core::{Codestream, CodestreamError, MarkerCode, StreamReader, StreamWriter};

fn image(width: u32, height: u32, num_comps: u16, bit_depth: u32, signed: bool) -> Codestream {
    let mut cs = Codestream::new();
    let siz = cs.siz_mut();
    siz.set_image_extent(Point::new(width, height));
    siz.set_num_components(num_comps).unwrap();
    for c in 0..num_comps {
        siz.set_component(c, Point::new(1, 1), bit_depth, signed)
            .unwrap();
    }
    cs
}

fn write_and_read(cs: &mut Codestream) -> Codestream {
    let mut writer = StreamWriter::new();
    cs.write_headers(&mut writer, &[]).unwrap();
    writer.write_marker(MarkerCode::StartOfTile);

    let bytes = writer.into_bytes();
    let mut parsed = Codestream::new();
    let mut reader = StreamReader::new(&bytes);
    parsed.read_headers(&mut reader).unwrap();
    assert_eq!(reader.peek_u16(), Some(0xFF90));
    parsed
}

#[test]
fn test_lossless_gray_header() {
    let mut cs = image(512, 512, 1, 8, false);
    cs.cod_mut().set_reversible(true);
    cs.cod_mut().set_num_decompositions(5).unwrap();

    let parsed = write_and_read(&mut cs);
    let qcd = parsed.qcd().main();
    assert!(qcd.is_reversible());
    assert_eq!(qcd.num_subbands(), 16);
    assert_eq!(qcd.num_guard_bits(), 1);
    assert_eq!(parsed.qcd(), cs.qcd());
    assert_eq!(parsed.siz().num_tiles(), Size::new(1, 1));
    assert!(!parsed.cap().is_irreversible());
}

#[test]
fn test_custom_kernel_header() {
    let kernel = Kernel::custom(
        2,
        CoefficientType::Int16,
        1.0,
        vec![
            LiftingStep::Reversible { a: 1, b: 2, e: 2 },
            LiftingStep::Reversible { a: -1, b: 1, e: 1 },
        ],
    )
    .unwrap();
    let mut cs = image(64, 48, 1, 10, false);
    cs.atk_mut().add(kernel.clone()).unwrap();
    cs.cod_mut().main_mut().set_wavelet_kernel(2);
    cs.cod_mut().set_num_decompositions(3).unwrap();

    let parsed = write_and_read(&mut cs);
    let read_back = parsed.atk().get(2).unwrap();
    assert_eq!(read_back, &kernel);
    assert!(read_back.is_reversible());
    assert_eq!(read_back.coefficient_type(), Some(CoefficientType::Int16));
    assert_eq!(parsed.cod().main().wavelet_kernel(), 2);
    assert!(parsed.cod().is_reversible());
    assert_eq!(parsed.cod().main().kernel(), Some(&kernel));
    assert!(parsed.qcd().main().is_reversible());
}

#[test]
fn test_component_overrides_roundtrip() {
    let mut cs = image(128, 128, 4, 8, false);
    cs.cod_mut().set_reversible(true);
    cs.cod_mut()
        .add_override(3)
        .set_num_decompositions(2)
        .unwrap();

    let parsed = write_and_read(&mut cs);
    assert_eq!(parsed.cod().component_num_decompositions(0), 5);
    assert_eq!(parsed.cod().component_num_decompositions(3), 2);
    assert!(parsed.cod().has_override(3));
    assert!(parsed.qcd().has_override(3));
    assert_eq!(parsed.qcd().resolve(3).num_subbands(), 7);
    assert_eq!(parsed.qcd().resolve(1).num_subbands(), 16);
}

#[test]
fn test_overrides_of_removed_components_are_trimmed() {
    let mut cs = image(32, 32, 4, 8, false);
    cs.cod_mut().set_reversible(true);
    cs.qcd_mut().set_component_delta(3, 0.25).unwrap();
    assert!(cs.qcd().has_override(3));

    cs.siz_mut().set_num_components(3).unwrap();
    let mut writer = StreamWriter::new();
    cs.write_headers(&mut writer, &[]).unwrap();
    assert!(!cs.qcd().has_override(3));

    let bytes = writer.into_bytes();
    let mut reader = StreamReader::new(&bytes);
    reader.advance(2).unwrap();
    let mut markers = Vec::new();
    while !reader.is_empty() {
        markers.push(reader.read_u16().unwrap());
        reader.skip_segment().unwrap();
    }
    assert!(!markers.contains(&u16::from(MarkerCode::QuantizationComponent)));
}

#[test]
fn test_component_field_width_boundary() {
    for (num_comps, field) in [(256u16, 1usize), (257, 2)] {
        let mut cs = image(16, 16, num_comps, 8, false);
        cs.cod_mut().set_reversible(true);
        cs.cod_mut()
            .add_override(num_comps - 1)
            .set_num_decompositions(1)
            .unwrap();

        let mut writer = StreamWriter::new();
        cs.write_headers(&mut writer, &[]).unwrap();
        let bytes = writer.into_bytes();
        let coc = bytes
            .windows(2)
            .position(|pair| pair == [0xFF, 0x53])
            .unwrap();
        let lcoc = usize::from(u16::from_be_bytes([bytes[coc + 2], bytes[coc + 3]]));
        assert_eq!(lcoc, 8 + field, "{num_comps} components");

        let mut parsed = Codestream::new();
        let mut reader = StreamReader::new(&bytes);
        // No SOT follows, so the header ends at the end of the data.
        assert_eq!(
            parsed.read_headers(&mut reader),
            Err(CodestreamError::UnexpectedEndOfData)
        );
        assert_eq!(parsed.cod().component_num_decompositions(num_comps - 1), 1);
    }
}

#[test]
fn test_dfs_nlt_and_comments_roundtrip() {
    let mut cs = image(96, 64, 2, 12, true);
    cs.cod_mut().set_reversible(true);
    cs.cod_mut().set_num_decompositions(2).unwrap();
    cs.dfs_mut().add(
        DfsRecord::new(1, &[DwtType::Bidirectional, DwtType::Horizontal]).unwrap(),
    );
    cs.cod_mut().add_override(1).set_dfs_index(1).unwrap();
    cs.nlt_mut()
        .set_nonlinear_transform(ALL_COMPS, NonlinearityType::BinaryComplement);
    let note = Comment::binary(vec![0, 1, 2, 0xFF]).unwrap();

    let mut writer = StreamWriter::new();
    cs.write_headers(&mut writer, std::slice::from_ref(&note))
        .unwrap();
    writer.write_marker(MarkerCode::StartOfTile);
    let bytes = writer.into_bytes();

    let mut parsed = Codestream::new();
    parsed
        .read_headers(&mut StreamReader::new(&bytes))
        .unwrap();

    let record = parsed.dfs().get(1).unwrap();
    assert_eq!(record.num_levels(), 2);
    assert_eq!(record.dwt_type(2), DwtType::Horizontal);
    assert_eq!(parsed.cod().resolve(1).dfs_index(), Some(1));
    assert_eq!(parsed.cod().component_num_decompositions(1), 2);
    assert_eq!(
        parsed.nlt().get_nonlinear_transform(0),
        Some((12, true, NonlinearityType::BinaryComplement))
    );
    assert_ne!(parsed.siz().rsiz() & 0x0200, 0);
    assert_eq!(parsed.comments().len(), 2);
    assert_eq!(parsed.comments()[1], note);
    assert!(!parsed.comments()[1].is_text());
}

#[test]
fn test_restart_allows_reuse() {
    let mut cs = image(40, 30, 3, 8, false);
    cs.cod_mut().set_reversible(true);
    cs.cod_mut().set_color_transform(true);
    let first = write_and_read(&mut cs);
    assert!(first.cod().is_using_color_transform());

    let mut reused = first;
    reused.restart();
    let mut writer = StreamWriter::new();
    assert!(reused.write_headers(&mut writer, &[]).is_err());

    let mut reused = image(8, 8, 1, 8, false);
    let second = write_and_read(&mut reused);
    assert!(!second.cod().is_reversible());
    assert!(!second.qcd().main().is_reversible());
    assert_eq!(second.qcd().main().num_subbands(), 16);
}
