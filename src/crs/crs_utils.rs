use std::{ffi::CString, fmt, marker::PhantomData};

use crate::error::CrsError;

pub type EpsgCode = u32;

/// Marker for the kind of coordinate reference system a geometry is expressed in.
///
/// The kind is part of the type of every tagged value, so geographic (degree) and
/// projected (linear unit) geometries cannot meet in a distance or containment query.
pub trait CrsKind: Copy + fmt::Debug + PartialEq + Eq + Send + Sync + 'static {
    const NAME: &'static str;

    /// PROJ object types that are of this kind.
    const PJ_TYPES: &'static [proj_sys::PJ_TYPE];
}

/// Longitude/latitude in degrees, e.g. WGS84.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Geographic;

/// Planar coordinates in a linear unit, e.g. metres of a state plane or UTM zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Projected;

impl CrsKind for Geographic {
    const NAME: &'static str = "geographic";
    const PJ_TYPES: &'static [proj_sys::PJ_TYPE] = &[
        proj_sys::PJ_TYPE_PJ_TYPE_GEOGRAPHIC_CRS,
        proj_sys::PJ_TYPE_PJ_TYPE_GEOGRAPHIC_2D_CRS,
        proj_sys::PJ_TYPE_PJ_TYPE_GEOGRAPHIC_3D_CRS,
    ];
}

impl CrsKind for Projected {
    const NAME: &'static str = "projected";
    const PJ_TYPES: &'static [proj_sys::PJ_TYPE] = &[proj_sys::PJ_TYPE_PJ_TYPE_PROJECTED_CRS];
}

/// An EPSG coordinate reference system of kind `K`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Crs<K: CrsKind> {
    code: EpsgCode,
    kind: PhantomData<K>,
}

impl<K: CrsKind> Crs<K> {
    pub fn code(&self) -> EpsgCode {
        self.code
    }

    /// Authority string understood by PROJ, e.g. "EPSG:4326".
    pub fn authority(&self) -> String {
        epsg_code_to_authority_string(self.code)
    }

    /// Check with the PROJ database that the code exists and is of kind `K`.
    ///
    /// The constructors only tag a code; `Crs::projected(4326)` compiles but names a
    /// degree based CRS and is rejected here.
    pub fn verify(&self) -> Result<(), CrsError> {
        let pj_type = query_crs_type(self.code)?;
        if !K::PJ_TYPES.contains(&pj_type) {
            return Err(CrsError::WrongKind {
                crs: self.to_string(),
                expected: K::NAME,
            });
        }
        Ok(())
    }
}

impl Crs<Geographic> {
    pub const fn geographic(code: EpsgCode) -> Self {
        Self {
            code,
            kind: PhantomData,
        }
    }

    pub const fn wgs84() -> Self {
        Self::geographic(4326)
    }
}

impl Crs<Projected> {
    pub const fn projected(code: EpsgCode) -> Self {
        Self {
            code,
            kind: PhantomData,
        }
    }
}

impl<K: CrsKind> fmt::Display for Crs<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.code)
    }
}

pub fn epsg_code_to_authority_string(code: EpsgCode) -> String {
    format!("EPSG:{}", code)
}

/// PROJ object type of an EPSG code, e.g. `PJ_TYPE_PJ_TYPE_PROJECTED_CRS` for 26985.
pub fn query_crs_type(code: EpsgCode) -> Result<proj_sys::PJ_TYPE, CrsError> {
    let authority = epsg_code_to_authority_string(code);
    let unknown = |reason: &str| CrsError::Unknown {
        crs: authority.clone(),
        reason: reason.to_string(),
    };
    let definition =
        CString::new(authority.as_str()).map_err(|_| unknown("authority string contains a NUL byte"))?;
    unsafe {
        let context = proj_sys::proj_context_create();
        let crs = proj_sys::proj_create(context, definition.as_ptr());
        if crs.is_null() {
            proj_sys::proj_context_destroy(context);
            return Err(unknown("not found in the PROJ database"));
        }
        let pj_type = proj_sys::proj_get_type(crs);
        proj_sys::proj_destroy(crs);
        proj_sys::proj_context_destroy(context);
        Ok(pj_type)
    }
}

/// WGS84 UTM zone containing the lon/lat coordinate.
///
/// # Arguments
/// * lon - longitude in degrees.
/// * lat - latitude in degrees. UTM is only defined between 80°S and 84°N.
///
/// # Returns
/// EPSG 326zz for the northern hemisphere, 327zz for the southern one.
pub fn utm_crs_for_lon_lat(lon: f64, lat: f64) -> Result<Crs<Projected>, CrsError> {
    if !(-180.0..=180.0).contains(&lon) || !(-80.0..=84.0).contains(&lat) {
        return Err(CrsError::OutOfRange {
            crs: "WGS84 UTM".to_string(),
            x: lon,
            y: lat,
        });
    }
    // Longitude 180 belongs to zone 60, not a 61st zone.
    let zone = (((lon + 180.0) / 6.0).floor() as u32 + 1).min(60);
    let base = if lat >= 0.0 { 32600 } else { 32700 };
    Ok(Crs::projected(base + zone))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::error::CrsError;

    use super::{query_crs_type, utm_crs_for_lon_lat, Crs, EpsgCode};

    #[rstest]
    #[case(139.813385, 35.707317999, 32654)] // WGS 84 UTM zone 54N for a coordinate in Tokyo.
    #[case(-98.261719, 35.581384, 32614)] // UTM zone 14N for a coordinate in Oklahoma.
    #[case(-76.60, 39.05, 32618)] // UTM zone 18N, central Maryland.
    #[case(151.2093, -33.8688, 32756)] // UTM zone 56S, Sydney.
    #[case(180.0, 10.0, 32660)] // The antimeridian stays in zone 60.
    fn test_utm_crs_for_lon_lat(#[case] lon: f64, #[case] lat: f64, #[case] expected: EpsgCode) {
        assert_eq!(utm_crs_for_lon_lat(lon, lat).unwrap().code(), expected);
    }

    #[rstest]
    #[case(-76.6, 85.0)]
    #[case(-76.6, -81.0)]
    #[case(181.0, 0.0)]
    fn test_utm_crs_for_lon_lat_out_of_range(#[case] lon: f64, #[case] lat: f64) {
        assert!(matches!(
            utm_crs_for_lon_lat(lon, lat),
            Err(CrsError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_authority_string() {
        assert_eq!(Crs::wgs84().authority(), "EPSG:4326");
        assert_eq!(Crs::projected(26985).to_string(), "EPSG:26985");
    }

    #[test]
    fn test_verify_accepts_matching_kind() {
        assert_eq!(Crs::wgs84().verify(), Ok(()));
        assert_eq!(Crs::geographic(4269).verify(), Ok(()));
        assert_eq!(Crs::projected(26985).verify(), Ok(()));
        assert_eq!(Crs::projected(32618).verify(), Ok(()));
    }

    #[test]
    fn test_verify_rejects_wrong_kind() {
        // Degrees tagged as a projected CRS.
        assert_eq!(
            Crs::projected(4326).verify(),
            Err(CrsError::WrongKind {
                crs: "EPSG:4326".to_string(),
                expected: "projected",
            })
        );
        assert_eq!(
            Crs::geographic(26985).verify(),
            Err(CrsError::WrongKind {
                crs: "EPSG:26985".to_string(),
                expected: "geographic",
            })
        );
    }

    #[test]
    fn test_query_crs_type_unknown_code() {
        assert!(matches!(
            query_crs_type(999_999),
            Err(CrsError::Unknown { .. })
        ));
    }
}
